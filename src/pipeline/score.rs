use crate::config::{Config, ScoringWeights};
use crate::types::ScoredZipRecord;
use tracing::debug;

/// Investor buy-box thresholds. Unset thresholds fall back to the
/// configured metadata defaults when built via `from_config`; `min_coc`
/// has no default and is only applied when explicitly supplied.
#[derive(Debug, Clone)]
pub struct BuyBox {
    /// Exact state-code match, applied before thresholds
    pub state: Option<String>,
    pub min_cap: f64,
    pub max_cash: f64,
    pub min_dscr: f64,
    pub min_coc: Option<f64>,
    pub limit: Option<usize>,
}

impl BuyBox {
    pub fn from_config(config: &Config) -> Self {
        Self {
            state: None,
            min_cap: config.cap_threshold,
            max_cash: config.budget.max_cash,
            min_dscr: config.min_dscr,
            min_coc: None,
            limit: config.result_limit,
        }
    }

    fn matches(&self, record: &ScoredZipRecord) -> bool {
        if let Some(state) = &self.state {
            if &record.state != state {
                return false;
            }
        }
        if record.cap_rate < self.min_cap || record.cash_needed > self.max_cash {
            return false;
        }
        // Unbounded coverage (no financing) passes any DSCR floor
        if let Some(dscr) = record.dscr {
            if dscr < self.min_dscr {
                return false;
            }
        }
        // An undefined return cannot satisfy an explicit floor
        if let Some(min_coc) = self.min_coc {
            match record.cash_on_cash {
                Some(coc) if coc >= min_coc => {}
                _ => return false,
            }
        }
        true
    }
}

/// Min–max normalization over the current result set. A degenerate span
/// (all values equal, or a single record) normalizes to 1.0 so scores stay
/// bounded and repeated runs stay identical.
fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        1.0
    }
}

/// Attaches the composite weighted score to every record. Each metric is
/// min–max normalized across the set; the weights sum to 1.0, so scores
/// land in [0, 1]. An absent DSCR normalizes to the set maximum (unbounded
/// coverage); an absent cash-on-cash contributes nothing.
pub fn attach_scores(records: &mut [ScoredZipRecord], weights: &ScoringWeights) {
    if records.is_empty() {
        return;
    }

    let caps: Vec<f64> = records.iter().map(|r| r.cap_rate).collect();
    let cash: Vec<f64> = records.iter().map(|r| r.cash_needed).collect();
    let cocs: Vec<f64> = records.iter().filter_map(|r| r.cash_on_cash).collect();
    let dscrs: Vec<f64> = records.iter().filter_map(|r| r.dscr).collect();

    let (cap_lo, cap_hi) = min_max(&caps);
    let (cash_lo, cash_hi) = min_max(&cash);
    let (coc_lo, coc_hi) = min_max(&cocs);
    let (dscr_lo, dscr_hi) = min_max(&dscrs);

    for record in records.iter_mut() {
        let cap_component = normalize(record.cap_rate, cap_lo, cap_hi);
        let coc_component = match record.cash_on_cash {
            Some(coc) if !cocs.is_empty() => normalize(coc, coc_lo, coc_hi),
            _ => 0.0,
        };
        let dscr_component = match record.dscr {
            Some(dscr) if !dscrs.is_empty() => normalize(dscr, dscr_lo, dscr_hi),
            _ => 1.0,
        };
        // Cheaper entry scores higher
        let cash_component = 1.0 - normalize(record.cash_needed, cash_lo, cash_hi);

        record.score = weights.cap_rate * cap_component
            + weights.cash_on_cash * coc_component
            + weights.dscr * dscr_component
            + weights.cash_inverse * cash_component;
    }
}

/// Applies the buy-box filters, sorts score descending (ties broken by cap
/// rate descending, then ZIP ascending for total determinism), and
/// truncates to the requested limit. Pure and idempotent.
pub fn apply_buy_box(records: &[ScoredZipRecord], buy_box: &BuyBox) -> Vec<ScoredZipRecord> {
    let mut kept: Vec<ScoredZipRecord> = records
        .iter()
        .filter(|r| buy_box.matches(r))
        .cloned()
        .collect();

    kept.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.cap_rate.total_cmp(&a.cap_rate))
            .then(a.zip.cmp(&b.zip))
    });

    if let Some(limit) = buy_box.limit {
        kept.truncate(limit);
    }

    debug!(kept = kept.len(), total = records.len(), "buy-box applied");
    kept
}
