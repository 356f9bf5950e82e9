//! Error types for the review stacking pipeline

use crate::models::ModelError;
use thiserror::Error;

/// Errors raised by pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A component was used before it was configured, or was given an
    /// impossible configuration (empty grid, transform before fit, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream data broke a structural guarantee of the pipeline
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Feature selection was asked to choose among too few columns
    #[error("Insufficient features: {available} usable columns, at least {required} required")]
    InsufficientFeatures { available: usize, required: usize },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON error on line {line}: {source}")]
    JsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
