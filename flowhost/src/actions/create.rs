//! The create action: compile, register, and start a new pipeline.

use crate::actions::ActionResult;
use crate::agent::Agent;
use crate::config::{PipelineCompiler, PipelineConfig, PipelineId};
use crate::errors::FlowhostError;
use crate::registry::PipelinesRegistry;
use std::sync::Arc;
use tracing::debug;

/// Creates and starts a pipeline for an identifier with no current entry.
pub struct Create {
    config: PipelineConfig,
    compiler: Arc<dyn PipelineCompiler>,
}

impl Create {
    /// Creates a create action for the configuration's target pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig, compiler: Arc<dyn PipelineCompiler>) -> Self {
        Self { config, compiler }
    }

    /// The identifier this action targets.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        self.config.pipeline_id()
    }

    /// Executes the creation.
    ///
    /// Registration goes through [`PipelinesRegistry::create_pipeline`], so
    /// a concurrent creation of the same identifier loses the placeholder
    /// race and fails without side effects.
    pub fn execute(&self, _agent: &Agent, registry: &PipelinesRegistry) -> ActionResult {
        let id = self.pipeline_id();

        debug!(pipeline = %id, hash = %self.config.config_hash(), "compiling pipeline");
        let pipeline = match self.compiler.compile(&self.config) {
            Ok(pipeline) => Arc::new(pipeline),
            Err(err) => return ActionResult::failure(id.clone(), err),
        };

        let mut startup_error = None;
        let created = registry.create_pipeline(id, Arc::clone(&pipeline), || {
            match pipeline.start() {
                Ok(()) => true,
                Err(err) => {
                    startup_error = Some(err);
                    false
                }
            }
        });

        if created {
            ActionResult::success(id.clone())
        } else {
            let error = startup_error.map_or_else(
                || FlowhostError::AlreadyRegistered(id.to_string()),
                FlowhostError::from,
            );
            ActionResult::failure(id.clone(), error)
        }
    }
}
