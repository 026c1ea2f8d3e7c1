use crate::error::{Result, ZipError};
use crate::sources::{self, RawCountyRow};
use crate::types::{CountyTaxRecord, StateTaxRecord};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the cached, normalized tax table inside the cache dir.
pub const TAX_CACHE_FILE: &str = "county_tax.csv";

/// Parses percentage text such as "0.2850%" into a decimal rate.
/// Rejects non-numeric input and rates outside [0, 1).
pub fn parse_rate_percent(text: &str) -> Result<f64> {
    let stripped = text.trim().trim_end_matches('%').trim();
    let value: f64 = stripped
        .parse()
        .map_err(|_| ZipError::Parse(format!("non-numeric tax rate '{text}'")))?;
    let rate = value / 100.0;
    if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
        return Err(ZipError::Parse(format!("tax rate '{text}' out of range")));
    }
    Ok(rate)
}

/// Normalizes county tax rows: percentage text to decimal rates, county
/// names stripped of the "County" suffix and title-cased for key matching.
pub struct RateNormalizer {
    county_suffix: Regex,
}

impl RateNormalizer {
    pub fn new() -> Self {
        Self {
            // Suffix only; a county literally named "County" is left alone.
            county_suffix: Regex::new(r"(?i)\s+County\s*$").expect("valid regex"),
        }
    }

    /// Strips the trailing "County" and title-cases the remainder.
    pub fn normalize_county_name(&self, raw: &str) -> String {
        let stripped = self.county_suffix.replace(raw.trim(), "");
        title_case(stripped.trim())
    }

    /// Converts raw rows into CountyTaxRecords. Rows whose rate field does
    /// not parse are dropped and counted, never fatal.
    pub fn normalize(&self, rows: &[RawCountyRow]) -> (Vec<CountyTaxRecord>, usize) {
        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for row in rows {
            match parse_rate_percent(&row.rate_text) {
                Ok(eff_tax_rate) => records.push(CountyTaxRecord {
                    state: row.state.clone(),
                    county_name: self.normalize_county_name(&row.county),
                    eff_tax_rate,
                    // No FIPS source available; a crosswalk would fill this
                    county_fips: String::new(),
                }),
                Err(e) => {
                    warn!(state = %row.state, county = %row.county, "Dropping tax row: {}", e);
                    skipped += 1;
                }
            }
        }

        (records, skipped)
    }
}

impl Default for RateNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tax_cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(TAX_CACHE_FILE)
}

/// Writes the normalized tax table wholesale: serialized to a temp file in
/// the same directory, then renamed over the previous artifact so readers
/// never observe a partial write.
pub fn write_tax_cache(path: &Path, records: &[CountyTaxRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp_path, path)?;
    debug!(rows = records.len(), path = %path.display(), "tax cache written");
    Ok(())
}

pub fn load_tax_cache(path: &Path) -> Result<Vec<CountyTaxRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize::<CountyTaxRecord>() {
        records.push(record?);
    }
    Ok(records)
}

/// Fetches the normalized county tax table, reusing the cache artifact when
/// present unless `force` is set. Returns the records plus the number of
/// raw rows dropped during normalization (0 on a cache hit).
pub fn fetch_county_tax(
    raw_csv: &Path,
    cache_path: &Path,
    force: bool,
) -> Result<(Vec<CountyTaxRecord>, usize)> {
    if cache_path.exists() && !force {
        let records = load_tax_cache(cache_path)?;
        info!(rows = records.len(), "loaded county tax table from cache");
        return Ok((records, 0));
    }

    let raw = sources::read_county_tax_rows(raw_csv)?;
    let normalizer = RateNormalizer::new();
    let (records, parse_skips) = normalizer.normalize(&raw.rows);
    let skipped = raw.skipped + parse_skips;

    write_tax_cache(cache_path, &records)?;
    info!(
        rows = records.len(),
        skipped, "county tax table normalized and cached"
    );
    Ok((records, skipped))
}

/// Reduces county records to one unweighted mean rate per state. Every
/// county counts equally regardless of size; this is the documented
/// precision limitation of the state-average tier.
pub fn state_averages(records: &[CountyTaxRecord]) -> Vec<StateTaxRecord> {
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for record in records {
        let entry = sums.entry(record.state.as_str()).or_insert((0.0, 0));
        entry.0 += record.eff_tax_rate;
        entry.1 += 1;
    }

    let mut averages: Vec<StateTaxRecord> = sums
        .into_iter()
        .map(|(state, (sum, count))| StateTaxRecord {
            state: state.to_string(),
            eff_tax_rate: sum / count as f64,
        })
        .collect();
    averages.sort_by(|a, b| a.state.cmp(&b.state));
    averages
}

/// One tier in the tax-rate resolution chain.
pub trait TaxResolver {
    fn name(&self) -> &'static str;
    fn resolve(&self, state: &str) -> Option<f64>;
}

/// Resolves a ZIP's tax rate from its state's county average.
pub struct StateAverageResolver {
    rates: HashMap<String, f64>,
}

impl StateAverageResolver {
    pub fn new(averages: &[StateTaxRecord]) -> Self {
        Self {
            rates: averages
                .iter()
                .map(|r| (r.state.clone(), r.eff_tax_rate))
                .collect(),
        }
    }
}

impl TaxResolver for StateAverageResolver {
    fn name(&self) -> &'static str {
        "state_average"
    }

    fn resolve(&self, state: &str) -> Option<f64> {
        self.rates.get(state).copied()
    }
}

/// Ordered chain of resolution strategies with a guaranteed final default,
/// so a fused record can never end up without a tax rate. A county-accurate
/// resolver can be pushed ahead of the state tier without touching any
/// downstream stage.
pub struct TaxRateChain {
    resolvers: Vec<Box<dyn TaxResolver>>,
    default_rate: f64,
}

impl TaxRateChain {
    pub fn new(default_rate: f64) -> Self {
        Self {
            resolvers: Vec::new(),
            default_rate,
        }
    }

    pub fn with_state_averages(averages: &[StateTaxRecord], default_rate: f64) -> Self {
        let mut chain = Self::new(default_rate);
        chain.push(Box::new(StateAverageResolver::new(averages)));
        chain
    }

    pub fn push(&mut self, resolver: Box<dyn TaxResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolve(&self, state: &str) -> f64 {
        for resolver in &self.resolvers {
            if let Some(rate) = resolver.resolve(state) {
                debug!(state, resolver = resolver.name(), rate, "tax rate resolved");
                return rate;
            }
        }
        debug!(state, rate = self.default_rate, "tax rate fell back to default");
        self.default_rate
    }
}
