//! Error types for the flowhost pipeline host.
//!
//! This module provides the error taxonomy for pipeline configuration,
//! startup, and reload handling. All reload-time failures are converted
//! into failed action results by the action layer; none of these types
//! escape `execute` as panics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for flowhost operations.
#[derive(Debug, Error)]
pub enum FlowhostError {
    /// No pipeline exists for the targeted identifier.
    #[error("no pipeline with id `{0}`")]
    PipelineNotFound(String),

    /// The existing pipeline or the candidate configuration declares
    /// itself non-reloadable.
    #[error("{0}")]
    NotReloadable(#[from] NotReloadableError),

    /// The candidate configuration failed to compile.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A stage's registration raised during pipeline startup.
    #[error("{0}")]
    Initialization(#[from] InitializationError),

    /// A stage failed outside of the registration phase.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// A pipeline identifier is already present or mid-creation.
    #[error("pipeline `{0}` is already registered or being created")]
    AlreadyRegistered(String),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error raised when a reload targets a pipeline that refuses to reload.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct NotReloadableError {
    /// The error message.
    pub message: String,
    /// The pipeline identifier involved.
    pub pipeline_id: String,
    /// Which side refused: the running pipeline or the new configuration.
    pub side: NonReloadableSide,
}

/// Which participant of a reload declared itself non-reloadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonReloadableSide {
    /// The currently-running pipeline.
    Existing,
    /// The candidate configuration.
    Candidate,
}

impl NotReloadableError {
    /// Creates an error for a non-reloadable running pipeline.
    #[must_use]
    pub fn existing(pipeline_id: impl Into<String>) -> Self {
        let pipeline_id = pipeline_id.into();
        Self {
            message: format!("pipeline `{pipeline_id}` is not reloadable"),
            pipeline_id,
            side: NonReloadableSide::Existing,
        }
    }

    /// Creates an error for a candidate configuration that opts out of
    /// reloading.
    #[must_use]
    pub fn candidate(pipeline_id: impl Into<String>) -> Self {
        let pipeline_id = pipeline_id.into();
        Self {
            message: format!("new configuration for `{pipeline_id}` is not reloadable"),
            pipeline_id,
            side: NonReloadableSide::Candidate,
        }
    }
}

/// Error raised when configuration source fails to compile.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// Approximate byte offset in the source, if known.
    pub offset: Option<usize>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            context: HashMap::new(),
        }
    }

    /// Sets the source offset.
    #[must_use]
    pub const fn at_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline fails to start.
///
/// Carries the stage whose registration failed so operators can pinpoint
/// the offending plugin without re-reading the whole configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("pipeline `{pipeline_id}` failed to start: {message}")]
pub struct InitializationError {
    /// The error message.
    pub message: String,
    /// The pipeline identifier.
    pub pipeline_id: String,
    /// The stage whose registration failed, if attributable.
    pub stage: Option<String>,
}

impl InitializationError {
    /// Creates a new initialization error.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pipeline_id: pipeline_id.into(),
            stage: None,
        }
    }

    /// Attributes the failure to a stage.
    #[must_use]
    pub fn in_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// Error raised by a stage during registration or shutdown.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("stage `{stage}` failed: {message}")]
pub struct StageError {
    /// The error message.
    pub message: String,
    /// The stage name.
    pub stage: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: stage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_reloadable_sides() {
        let existing = NotReloadableError::existing("main");
        assert_eq!(existing.side, NonReloadableSide::Existing);
        assert!(existing.message.contains("main"));

        let candidate = NotReloadableError::candidate("main");
        assert_eq!(candidate.side, NonReloadableSide::Candidate);
        assert!(candidate.message.contains("new configuration"));
    }

    #[test]
    fn test_configuration_error_builder() {
        let err = ConfigurationError::new("unexpected token")
            .at_offset(17)
            .with_context_entry("section", "input");
        assert_eq!(err.offset, Some(17));
        assert_eq!(err.context.get("section").map(String::as_str), Some("input"));
    }

    #[test]
    fn test_initialization_error_display() {
        let err = InitializationError::new("main", "bad value").in_stage("blocking");
        assert_eq!(
            err.to_string(),
            "pipeline `main` failed to start: bad value"
        );
        assert_eq!(err.stage.as_deref(), Some("blocking"));
    }

    #[test]
    fn test_umbrella_conversions() {
        let err: FlowhostError = ConfigurationError::new("boom").into();
        assert!(matches!(err, FlowhostError::Configuration(_)));

        let err: FlowhostError = InitializationError::new("main", "boom").into();
        assert!(matches!(err, FlowhostError::Initialization(_)));
    }
}
