//! Error handling for visflow
//!
//! This module defines the crate-level error type and a Result alias used by
//! configuration loading and the binary. Errors raised inside the pipeline
//! core use [`PipelineError`] and convert into [`VisflowError`].

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for visflow operations
#[derive(Error, Debug)]
pub enum VisflowError {
    /// Errors raised while assembling or driving the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading and validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VisflowError>,
    },
}

impl VisflowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VisflowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The underlying pipeline error, looking through any context.
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            VisflowError::Pipeline(e) => Some(e),
            VisflowError::WithContext { source, .. } => source.pipeline_error(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VisflowError {
    fn from(e: serde_json::Error) -> Self {
        VisflowError::Serialization(e.to_string())
    }
}

/// Result type alias for visflow operations
pub type Result<T> = std::result::Result<T, VisflowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<VisflowError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VisflowError::Config("duplicate component 'thresh'".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: duplicate component 'thresh'"
        );
    }

    #[test]
    fn test_pipeline_error_with_context() {
        let result: std::result::Result<(), PipelineError> =
            Err(PipelineError::UnknownComponent("calib".to_string()));
        let err = result.context("Failed to build pipeline").unwrap_err();
        assert!(err.to_string().starts_with("Failed to build pipeline"));
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::UnknownComponent(_))
        ));
    }
}
