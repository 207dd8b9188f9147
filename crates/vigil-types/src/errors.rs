use thiserror::Error;

pub type Result<T, E = VigilError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("inference error: {0}")]
    Inference(String),
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
    #[error("orchestrator error: {0}")]
    Orchestrator(String),
    #[error("report error: {0}")]
    Report(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
