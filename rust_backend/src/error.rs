//! Error types for the processing pipeline.
//!
//! Only structural and I/O level failures are represented here. Row-level
//! defects never become errors: they are captured as data (QC categories or
//! validation findings) and travel with the result.

use std::path::PathBuf;

use polars::prelude::PolarsError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Required fields are absent from the input header. Fatal, no output is produced.
    #[error("Missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Frame error: {0}")]
    Polars(#[from] PolarsError),

    /// A chunk-level failure inside the execution engine. Aborts the run.
    #[error("Execution failed during {stage}: {message}")]
    Execution { stage: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn execution(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Execution {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
