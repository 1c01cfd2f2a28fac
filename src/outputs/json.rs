//! JSON copy of the consolidated report.
//!
//! # Output Structure
//!
//! Files are grouped by local date, one file per run:
//! ```text
//! json_output_dir/
//! └── 2026-02-19/
//!     ├── report_093015.json
//!     └── report_181502.json
//! ```

use crate::error::Result;
use crate::models::ConsolidatedReport;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Where a report written at `at` lands under `json_output_dir`.
pub fn report_path(json_output_dir: &Path, at: DateTime<Local>) -> PathBuf {
    json_output_dir
        .join(at.format("%Y-%m-%d").to_string())
        .join(format!("report_{}.json", at.format("%H%M%S")))
}

/// Serialize `report` into a dated directory and return the file path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir.display()))]
pub async fn write_report(report: &ConsolidatedReport, json_output_dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(json_output_dir, Local::now());

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON report");
    Ok(path)
}
