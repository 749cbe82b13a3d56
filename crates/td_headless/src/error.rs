//! Error types for the headless runner.

use thiserror::Error;

use td_core::error::CoreError;

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// Core configuration or construction failed.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Run settings are unusable.
    #[error("Invalid run settings: {0}")]
    InvalidSettings(String),

    /// The report could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The report could not be written.
    #[error("Failed to write report to {path}: {source}")]
    Write {
        /// Destination path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
