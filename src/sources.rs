use crate::error::{Result, ZipError};
use crate::types::ZipBaseRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Raw county tax row as it appears in the source CSV, before any unit
/// normalization.
#[derive(Debug, Clone)]
pub struct RawCountyRow {
    pub state: String,
    pub county: String,
    /// Percentage text, e.g. "0.2850%"
    pub rate_text: String,
}

/// Outcome of reading one source file: the usable rows plus how many were
/// dropped as malformed.
#[derive(Debug)]
pub struct SourceRows<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

const STATE_HEADER: &str = "State";
const COUNTY_HEADER: &str = "County";
const RATE_HEADER_PREFIX: &str = "Effective Property Tax Rate";

/// Pads a raw ZIP code to the canonical 5-digit form.
pub fn normalize_zip(raw: &str) -> String {
    format!("{:0>5}", raw.trim())
}

/// Reads the raw county tax CSV. Columns are located by header name; the
/// rate column is matched by prefix so vintage suffixes like
/// "Effective Property Tax Rate (2023)" still resolve. A missing column is
/// a malformed file and fails the run outright.
pub fn read_county_tax_rows(path: &Path) -> Result<SourceRows<RawCountyRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let find = |pred: &dyn Fn(&str) -> bool, label: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| pred(h.trim()))
            .ok_or_else(|| {
                ZipError::Parse(format!(
                    "county tax CSV '{}' is missing the '{}' column",
                    path.display(),
                    label
                ))
            })
    };
    let state_idx = find(&|h| h == STATE_HEADER, STATE_HEADER)?;
    let county_idx = find(&|h| h == COUNTY_HEADER, COUNTY_HEADER)?;
    let rate_idx = find(&|h| h.starts_with(RATE_HEADER_PREFIX), RATE_HEADER_PREFIX)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable county tax row: {}", e);
                skipped += 1;
                continue;
            }
        };
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        let row = RawCountyRow {
            state: field(state_idx).to_uppercase(),
            county: field(county_idx),
            rate_text: field(rate_idx),
        };
        if row.state.is_empty() || row.county.is_empty() {
            warn!("Skipping county tax row with empty state or county");
            skipped += 1;
            continue;
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), skipped, "loaded county tax rows");
    Ok(SourceRows { rows, skipped })
}

#[derive(Debug, Deserialize)]
struct BaselineRow {
    zip: String,
    city: String,
    state: String,
    price: f64,
    rent: f64,
}

/// Reads ZIP-level baseline records (price, rent, city, state). Rows that
/// fail to deserialize are dropped and counted, never fatal.
pub fn read_baselines(path: &Path) -> Result<SourceRows<ZipBaseRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for record in reader.deserialize::<BaselineRow>() {
        match record {
            Ok(row) => rows.push(ZipBaseRecord {
                zip: normalize_zip(&row.zip),
                city: row.city.trim().to_string(),
                state: row.state.trim().to_uppercase(),
                price: row.price,
                rent: row.rent,
            }),
            Err(e) => {
                warn!("Skipping malformed baseline row: {}", e);
                skipped += 1;
            }
        }
    }

    debug!(rows = rows.len(), skipped, "loaded baseline rows");
    Ok(SourceRows { rows, skipped })
}

#[derive(Debug, Deserialize)]
struct CrimeRow {
    zip: String,
    crime_index: f64,
}

/// Loads the optional crime-index signal keyed by ZIP. An absent file is a
/// soft gap: every ZIP later falls back to the neutral index.
pub fn read_crime_index(path: Option<&Path>) -> Result<HashMap<String, f64>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    if !path.exists() {
        warn!("Crime CSV not found at '{}', using neutral defaults", path.display());
        return Ok(HashMap::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut map = HashMap::new();
    for record in reader.deserialize::<CrimeRow>() {
        match record {
            Ok(row) => {
                map.insert(normalize_zip(&row.zip), row.crime_index);
            }
            Err(e) => warn!("Skipping malformed crime row: {}", e),
        }
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
struct InventoryRow {
    zip: String,
    inventory_hits: u64,
}

/// Loads the optional listing-inventory signal keyed by ZIP.
pub fn read_inventory(path: Option<&Path>) -> Result<HashMap<String, u64>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    if !path.exists() {
        warn!(
            "Inventory CSV not found at '{}', using zero defaults",
            path.display()
        );
        return Ok(HashMap::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut map = HashMap::new();
    for record in reader.deserialize::<InventoryRow>() {
        match record {
            Ok(row) => {
                map.insert(normalize_zip(&row.zip), row.inventory_hits);
            }
            Err(e) => warn!("Skipping malformed inventory row: {}", e),
        }
    }
    Ok(map)
}
