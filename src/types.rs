use serde::{Deserialize, Serialize};

/// Normalized per-county property tax record produced by the rate
/// normalizer. Immutable once built; also the row format of the tax cache
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyTaxRecord {
    /// Two-letter state code, upper-cased
    pub state: String,
    /// County name with the trailing "County" suffix stripped, title-cased
    pub county_name: String,
    /// Effective property tax rate as a decimal (0 <= r < 1)
    pub eff_tax_rate: f64,
    /// FIPS code placeholder; empty until a county crosswalk exists
    pub county_fips: String,
}

/// Per-state average tax rate derived from county records. Recomputed each
/// run, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTaxRecord {
    pub state: String,
    /// Unweighted arithmetic mean of the state's county rates
    pub eff_tax_rate: f64,
}

/// Raw ZIP-level baseline row as loaded from the baselines CSV, before
/// fusion and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipBaseRecord {
    pub zip: String,
    pub city: String,
    pub state: String,
    pub price: f64,
    pub rent: f64,
}

/// Fully fused ZIP record: baseline data plus the resolved tax rate and
/// auxiliary signals with neutral defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipRecord {
    /// 5-digit ZIP code, zero-padded, unique key
    pub zip: String,
    pub city: String,
    pub state: String,
    pub price: f64,
    /// Monthly rent
    pub rent: f64,
    /// Resolved effective tax rate; the fallback chain guarantees this is
    /// always populated
    pub eff_tax_rate: f64,
    /// Neutral default 1.0 when no crime data covers the ZIP
    pub crime_index: f64,
    /// Listing inventory hit count, default 0
    pub inventory_hits: u64,
}

/// Terminal entity: a fused ZIP record with all derived investment metrics
/// and its composite score attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredZipRecord {
    pub zip: String,
    pub city: String,
    pub state: String,
    pub price: f64,
    pub rent: f64,
    pub eff_tax_rate: f64,
    pub crime_index: f64,
    pub inventory_hits: u64,
    /// Annual net operating income
    pub noi: f64,
    pub cap_rate: f64,
    /// None when cash needed is non-positive (return is undefined)
    pub cash_on_cash: Option<f64>,
    /// None when annual debt service is zero (unfinanced, unbounded
    /// coverage); never NaN or infinite
    pub dscr: Option<f64>,
    pub cash_needed: f64,
    /// Composite weighted score in [0, 1]
    pub score: f64,
}
