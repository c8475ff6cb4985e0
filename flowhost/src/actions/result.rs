//! Action execution results.

use crate::config::PipelineId;
use crate::errors::FlowhostError;
use serde::Serialize;

/// The outcome of one action execution.
///
/// Constructed exactly once, at the point execution concludes: success, or
/// the first encountered failure. Never mutated after construction.
#[derive(Debug)]
pub struct ActionResult {
    pipeline_id: PipelineId,
    error: Option<FlowhostError>,
}

impl ActionResult {
    /// Creates a successful result.
    #[must_use]
    pub const fn success(pipeline_id: PipelineId) -> Self {
        Self {
            pipeline_id,
            error: None,
        }
    }

    /// Creates a failed result carrying the underlying cause.
    #[must_use]
    pub fn failure(pipeline_id: PipelineId, error: impl Into<FlowhostError>) -> Self {
        Self {
            pipeline_id,
            error: Some(error.into()),
        }
    }

    /// Returns the identifier of the pipeline the action targeted.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Whether the action succeeded.
    #[must_use]
    pub const fn successful(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the failure cause, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&FlowhostError> {
        self.error.as_ref()
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Produces a serializable summary for operator-facing surfaces.
    #[must_use]
    pub fn summary(&self) -> ActionResultSummary {
        ActionResultSummary {
            pipeline_id: self.pipeline_id.as_str().to_string(),
            successful: self.successful(),
            message: self.message(),
        }
    }
}

/// A flat, serializable view of an [`ActionResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ActionResultSummary {
    /// The targeted pipeline identifier.
    pub pipeline_id: String,
    /// Whether the action succeeded.
    pub successful: bool,
    /// Failure message, absent on success.
    pub message: Option<String>,
}
