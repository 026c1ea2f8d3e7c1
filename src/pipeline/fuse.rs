use crate::pipeline::tax::TaxRateChain;
use crate::types::{ZipBaseRecord, ZipRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Neutral crime index applied when no signal covers a ZIP.
pub const NEUTRAL_CRIME_INDEX: f64 = 1.0;

/// Outcome of the fusion stage: the fused records plus drop counts.
/// Records are only ever dropped for invalid price/rent or duplicate keys;
/// missing auxiliary signals always fall back to neutral defaults.
#[derive(Debug)]
pub struct FuseOutcome {
    pub records: Vec<ZipRecord>,
    /// Non-positive or non-finite price/rent
    pub invalid_records: usize,
    /// Outside the configured state allowlist
    pub out_of_state: usize,
    /// Repeated ZIP keys (first occurrence wins)
    pub duplicates: usize,
}

/// Left-joins ZIP baselines against the tax resolution chain and the per-ZIP
/// auxiliary signals. Every emitted record carries a resolved tax rate; the
/// chain's default tier guarantees it.
pub fn fuse(
    base: Vec<ZipBaseRecord>,
    tax: &TaxRateChain,
    crime: &HashMap<String, f64>,
    inventory: &HashMap<String, u64>,
    states_allowlist: &[String],
) -> FuseOutcome {
    let allowlist: HashSet<&str> = states_allowlist.iter().map(String::as_str).collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut records = Vec::with_capacity(base.len());
    let mut invalid_records = 0usize;
    let mut out_of_state = 0usize;
    let mut duplicates = 0usize;

    for row in base {
        if !allowlist.is_empty() && !allowlist.contains(row.state.as_str()) {
            out_of_state += 1;
            continue;
        }
        if !row.price.is_finite() || row.price <= 0.0 || !row.rent.is_finite() || row.rent <= 0.0 {
            warn!(zip = %row.zip, price = row.price, rent = row.rent, "Dropping ZIP with invalid price or rent");
            invalid_records += 1;
            continue;
        }
        if !seen.insert(row.zip.clone()) {
            warn!(zip = %row.zip, "Dropping duplicate ZIP record");
            duplicates += 1;
            continue;
        }

        let eff_tax_rate = tax.resolve(&row.state);
        records.push(ZipRecord {
            eff_tax_rate,
            crime_index: crime.get(&row.zip).copied().unwrap_or(NEUTRAL_CRIME_INDEX),
            inventory_hits: inventory.get(&row.zip).copied().unwrap_or(0),
            zip: row.zip,
            city: row.city,
            state: row.state,
            price: row.price,
            rent: row.rent,
        });
    }

    debug!(
        fused = records.len(),
        invalid_records, out_of_state, duplicates, "fusion complete"
    );
    FuseOutcome {
        records,
        invalid_records,
        out_of_state,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateTaxRecord;

    const EPS: f64 = 1e-12;

    fn base(zip: &str, state: &str, price: f64, rent: f64) -> ZipBaseRecord {
        ZipBaseRecord {
            zip: zip.to_string(),
            city: "Testville".to_string(),
            state: state.to_string(),
            price,
            rent,
        }
    }

    fn chain() -> TaxRateChain {
        let averages = vec![StateTaxRecord {
            state: "AL".to_string(),
            eff_tax_rate: 0.00339,
        }];
        TaxRateChain::with_state_averages(&averages, 0.015)
    }

    #[test]
    fn every_fused_record_has_a_tax_rate() {
        let rows = vec![
            base("35004", "AL", 142_000.0, 1_100.0),
            base("82001", "WY", 260_000.0, 1_400.0),
        ];
        let outcome = fuse(rows, &chain(), &HashMap::new(), &HashMap::new(), &[]);

        assert_eq!(outcome.records.len(), 2);
        let al = outcome.records.iter().find(|r| r.state == "AL").unwrap();
        assert!((al.eff_tax_rate - 0.00339).abs() < EPS);
        // State with no tax data falls back to the configured default
        let wy = outcome.records.iter().find(|r| r.state == "WY").unwrap();
        assert!((wy.eff_tax_rate - 0.015).abs() < EPS);
    }

    #[test]
    fn auxiliary_signals_default_to_neutral_values() {
        let mut crime = HashMap::new();
        crime.insert("35004".to_string(), 1.8);
        let mut inventory = HashMap::new();
        inventory.insert("35004".to_string(), 7u64);

        let rows = vec![
            base("35004", "AL", 142_000.0, 1_100.0),
            base("35005", "AL", 95_000.0, 900.0),
        ];
        let outcome = fuse(rows, &chain(), &crime, &inventory, &[]);

        let covered = outcome.records.iter().find(|r| r.zip == "35004").unwrap();
        assert!((covered.crime_index - 1.8).abs() < EPS);
        assert_eq!(covered.inventory_hits, 7);

        let uncovered = outcome.records.iter().find(|r| r.zip == "35005").unwrap();
        assert!((uncovered.crime_index - NEUTRAL_CRIME_INDEX).abs() < EPS);
        assert_eq!(uncovered.inventory_hits, 0);
    }

    #[test]
    fn invalid_price_or_rent_drops_the_record() {
        let rows = vec![
            base("35004", "AL", 0.0, 1_100.0),
            base("35005", "AL", 95_000.0, -5.0),
            base("35006", "AL", f64::NAN, 900.0),
            base("35007", "AL", 120_000.0, 950.0),
        ];
        let outcome = fuse(rows, &chain(), &HashMap::new(), &HashMap::new(), &[]);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.invalid_records, 3);
        assert_eq!(outcome.records[0].zip, "35007");
    }

    #[test]
    fn allowlist_filters_states_and_empty_allowlist_keeps_all() {
        let rows = vec![
            base("35004", "AL", 142_000.0, 1_100.0),
            base("30301", "GA", 300_000.0, 1_500.0),
            base("82001", "WY", 260_000.0, 1_400.0),
        ];
        let allow = vec!["AL".to_string(), "GA".to_string()];
        let outcome = fuse(
            rows.clone(),
            &chain(),
            &HashMap::new(),
            &HashMap::new(),
            &allow,
        );
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.out_of_state, 1);

        let all = fuse(rows, &chain(), &HashMap::new(), &HashMap::new(), &[]);
        assert_eq!(all.records.len(), 3);
    }

    #[test]
    fn duplicate_zips_keep_first_occurrence() {
        let rows = vec![
            base("35004", "AL", 142_000.0, 1_100.0),
            base("35004", "AL", 150_000.0, 1_200.0),
        ];
        let outcome = fuse(rows, &chain(), &HashMap::new(), &HashMap::new(), &[]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.duplicates, 1);
        assert!((outcome.records[0].price - 142_000.0).abs() < EPS);
    }
}
