//! Operational helpers: logging setup and session report persistence.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vigil_types::{config::OpsConfig, summary::SessionSummary, Result, VigilError};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| VigilError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| VigilError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Destination for the end-of-session summary.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, summary: &SessionSummary) -> Result<()>;
}

/// Writes the summary as a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for JsonReportWriter {
    async fn persist(&self, summary: &SessionSummary) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent).await?;
        }
        let document = serde_json::to_vec_pretty(summary)
            .map_err(|err| report_error(format!("failed to serialize summary: {err}")))?;
        tokio::fs::write(&self.path, document).await.map_err(|err| {
            report_error(format!("failed to write {}: {err}", self.path.display()))
        })?;
        info!("Output saved: {}", self.path.display());
        Ok(())
    }
}

/// In-memory sink used when no file should be written.
#[derive(Clone, Default)]
pub struct MemoryReportSink {
    summaries: Arc<Mutex<Vec<SessionSummary>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<SessionSummary> {
        self.summaries.lock().await.clone()
    }
}

#[async_trait]
impl ReportSink for MemoryReportSink {
    async fn persist(&self, summary: &SessionSummary) -> Result<()> {
        self.summaries.lock().await.push(summary.clone());
        Ok(())
    }
}

pub async fn ensure_output_dir(path: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| report_error(format!("failed to create output dir: {err}")))?;
    Ok(path.to_path_buf())
}

pub fn report_error(message: impl Into<String>) -> VigilError {
    VigilError::Report(message.into())
}
