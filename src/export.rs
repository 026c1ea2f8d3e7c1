use crate::error::{Result, ZipError};
use crate::types::ScoredZipRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the ranked output table inside the output dir.
pub const TARGET_ZIPS_FILE: &str = "target_zips.csv";

pub fn target_zips_path(output_dir: &Path) -> PathBuf {
    output_dir.join(TARGET_ZIPS_FILE)
}

/// Writes the ranked table wholesale: temp file in the same directory, then
/// an atomic rename, so a serving process never reads a partial table.
pub fn write_scored_csv(path: &Path, records: &[ScoredZipRecord]) -> Result<()> {
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
    info!(rows = records.len(), path = %path.display(), "scored table written");
    Ok(())
}

/// Loads a previously written ranked table, preserving its order.
pub fn read_scored_csv(path: &Path) -> Result<Vec<ScoredZipRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize::<ScoredZipRecord>() {
        records.push(record?);
    }
    Ok(records)
}

/// Renders a record set to CSV bytes for the export endpoint.
pub fn render_csv(records: &[ScoredZipRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| ZipError::Parse(format!("CSV render failed: {e}")))
}
