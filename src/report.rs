use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::types::ScanSummary;

/// Path a report with `report_id` is written to inside `dir`.
pub fn report_path(dir: impl AsRef<Path>, report_id: &str) -> PathBuf {
    dir.as_ref().join(format!("{report_id}.xml"))
}

/// Write the report body verbatim to `<dir>/<report_id>.xml`, creating `dir` if needed.
pub fn save_report(dir: impl AsRef<Path>, report_id: &str, body: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    let path = report_path(dir, report_id);
    fs::write(&path, body).with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

pub fn write_summary_json(path: &Path, summary: &ScanSummary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create summary file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
