//! The stop action: shut down a pipeline and remove its registry entry.

use crate::actions::ActionResult;
use crate::agent::Agent;
use crate::config::PipelineId;
use crate::errors::FlowhostError;
use crate::registry::PipelinesRegistry;
use tracing::info;

/// Stops the pipeline for an identifier and removes it from the registry.
pub struct Stop {
    pipeline_id: PipelineId,
}

impl Stop {
    /// Creates a stop action for `pipeline_id`.
    #[must_use]
    pub fn new(pipeline_id: impl Into<PipelineId>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
        }
    }

    /// The identifier this action targets.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    /// Executes the stop.
    ///
    /// Unlike reload's fire-and-forget retirement, a deliberate stop waits
    /// for the worker thread to join before removing the entry.
    pub fn execute(&self, _agent: &Agent, registry: &PipelinesRegistry) -> ActionResult {
        let id = &self.pipeline_id;

        let Some(pipeline) = registry.get_pipeline(id) else {
            return ActionResult::failure(
                id.clone(),
                FlowhostError::PipelineNotFound(id.to_string()),
            );
        };

        pipeline.shutdown();
        pipeline.join();
        registry.remove_pipeline(id);
        info!(pipeline = %id, "pipeline stopped and removed");
        ActionResult::success(id.clone())
    }
}
