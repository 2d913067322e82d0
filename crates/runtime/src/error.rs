//! Pipeline-level error types.

use thiserror::Error;

use crate::adapter::AdapterError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Schema(#[from] warden_core::SchemaError),

    #[error("bundle write failed: {0}")]
    BundleWrite(String),
}

impl PipelineError {
    /// Stable code for structured reports.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Adapter(AdapterError::Timeout { .. }) => "ADAPTER_TIMEOUT",
            Self::Adapter(_) => "ADAPTER_ERROR",
            Self::Schema(_) => "SCHEMA_INVALID",
            Self::BundleWrite(_) => "BUNDLE_WRITE_FAILED",
        }
    }
}
