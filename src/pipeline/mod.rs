pub mod finance;
pub mod fuse;
pub mod score;
pub mod tax;

use crate::config::Config;
use crate::error::Result;
use crate::sources;
use crate::types::ScoredZipRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// Counters for one pipeline run. Soft skips are counted here instead of
/// aborting the batch; the CLI prints this and every count is logged.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// County tax rows that survived normalization
    pub counties_in: usize,
    /// Raw tax rows dropped for unparseable fields
    pub tax_skips: usize,
    /// Baseline rows read from the source CSV
    pub base_rows_in: usize,
    /// Baseline rows dropped as malformed at read time
    pub base_skips: usize,
    /// Fused records dropped for non-positive price/rent
    pub invalid_records: usize,
    pub out_of_state: usize,
    pub duplicates: usize,
    /// Records that entered the metrics engine
    pub fused: usize,
    /// Records surviving the buy-box filter
    pub scored: usize,
}

/// Result of a complete pipeline run: the ranked table plus its summary.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub records: Vec<ScoredZipRecord>,
    pub summary: RunSummary,
}

/// Runs the full batch transform: tax normalization (cache aware) ->
/// state aggregation -> fusion -> per-record metrics -> scoring and
/// buy-box filtering with the configured defaults.
#[instrument(skip(config))]
pub fn run_pipeline(config: &Config, force: bool) -> Result<PipelineOutcome> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let clock = Instant::now();
    info!(%run_id, "pipeline run starting");

    let cache_path = tax::tax_cache_path(Path::new(&config.data.cache_dir));
    let (counties, tax_skips) =
        tax::fetch_county_tax(Path::new(&config.data.county_tax_csv), &cache_path, force)?;
    let averages = tax::state_averages(&counties);
    info!(
        counties = counties.len(),
        states = averages.len(),
        "tax table aggregated"
    );
    let chain = tax::TaxRateChain::with_state_averages(&averages, config.default_tax_rate);

    let baselines = sources::read_baselines(Path::new(&config.data.baselines_csv))?;
    let base_rows_in = baselines.rows.len();
    let base_skips = baselines.skipped;

    let crime = sources::read_crime_index(config.data.crime_csv.as_deref().map(Path::new))?;
    let inventory = sources::read_inventory(config.data.inventory_csv.as_deref().map(Path::new))?;

    let fused = fuse::fuse(
        baselines.rows,
        &chain,
        &crime,
        &inventory,
        &config.states_allowlist,
    );

    let mut records: Vec<ScoredZipRecord> = fused
        .records
        .iter()
        .map(|record| {
            finance::compute_metrics(record, &config.loan, &config.cash_costs, &config.assumptions)
        })
        .collect();

    score::attach_scores(&mut records, &config.scoring_weights);
    let ranked = score::apply_buy_box(&records, &score::BuyBox::from_config(config));

    let summary = RunSummary {
        run_id,
        started_at,
        duration_ms: clock.elapsed().as_millis() as u64,
        counties_in: counties.len(),
        tax_skips,
        base_rows_in,
        base_skips,
        invalid_records: fused.invalid_records,
        out_of_state: fused.out_of_state,
        duplicates: fused.duplicates,
        fused: fused.records.len(),
        scored: ranked.len(),
    };
    info!(
        %run_id,
        fused = summary.fused,
        scored = summary.scored,
        duration_ms = summary.duration_ms,
        "pipeline run finished"
    );

    Ok(PipelineOutcome {
        records: ranked,
        summary,
    })
}
