//! Report persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::context::RunId;
use crate::report::RunReport;

/// Default directory reports are written to.
pub const DEFAULT_SAVE_DIR: &str = "runs";

/// `<save_dir>/<run_id>.json`
pub fn default_report_path(save_dir: &Path, run_id: &RunId) -> PathBuf {
    save_dir.join(format!("{run_id}.json"))
}

/// Destination for finished reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Write `report` to `destination`, returning where it landed.
    async fn write(&self, report: &RunReport, destination: &Path) -> Result<PathBuf>;
}

/// Writes pretty-printed JSON, creating parent directories as needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileSink;

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn write(&self, report: &RunReport, destination: &Path) -> Result<PathBuf> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(report).context("failed to serialize run report")?;
        tokio::fs::write(destination, json)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;
        info!(path = %destination.display(), run_id = %report.run_id, "run report written");
        Ok(destination.to_path_buf())
    }
}
