//! The reload action: hot-swap a running pipeline for a newly-configured
//! instance.

use crate::actions::ActionResult;
use crate::agent::Agent;
use crate::config::{PipelineCompiler, PipelineConfig, PipelineId};
use crate::errors::{FlowhostError, NotReloadableError};
use crate::registry::PipelinesRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Replaces the running pipeline for an identifier with one compiled from
/// a new configuration.
///
/// Validation happens strictly before any registry mutation: a failed
/// reload is a no-op from the registry's point of view, and the old
/// pipeline is never stopped until its replacement has fully started — so
/// the identifier never has zero live pipelines.
///
/// The caller must hold the orchestrator's exclusive-access guarantee for
/// the duration of `execute`; without it, two concurrent reloads of the
/// same identifier could both pass validation and race to publish, leaking
/// the loser's pipeline. The action performs no locking of its own beyond
/// what the registry intrinsically provides.
pub struct Reload {
    config: PipelineConfig,
    compiler: Arc<dyn PipelineCompiler>,
}

impl Reload {
    /// Creates a reload action for the configuration's target pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig, compiler: Arc<dyn PipelineCompiler>) -> Self {
        Self { config, compiler }
    }

    /// The identifier this action targets.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        self.config.pipeline_id()
    }

    /// Executes the reload.
    ///
    /// All failure kinds (no such pipeline, either side non-reloadable,
    /// compilation error, startup error) are converted into a failed
    /// result; none escape as panics. There is no startup timeout: a stage
    /// whose registration blocks indefinitely blocks the reload, and with
    /// it the exclusivity guarantee, until it returns.
    pub fn execute(&self, agent: &Agent, registry: &PipelinesRegistry) -> ActionResult {
        let id = self.pipeline_id();

        let Some(existing) = registry.get_pipeline(id) else {
            return ActionResult::failure(
                id.clone(),
                FlowhostError::PipelineNotFound(id.to_string()),
            );
        };
        if !existing.reloadable() {
            return ActionResult::failure(id.clone(), NotReloadableError::existing(id.as_str()));
        }
        if !self.config.reloadable() {
            return ActionResult::failure(id.clone(), NotReloadableError::candidate(id.as_str()));
        }

        debug!(pipeline = %id, hash = %self.config.config_hash(), "compiling reload candidate");
        let candidate = match self.compiler.compile(&self.config) {
            Ok(pipeline) => Arc::new(pipeline),
            Err(err) => return ActionResult::failure(id.clone(), err),
        };

        // The candidate is started before the swap; it is discarded, never
        // published, if any stage's registration fails.
        if let Err(err) = candidate.start() {
            debug!(pipeline = %id, %err, "reload candidate failed to start, old pipeline untouched");
            return ActionResult::failure(id.clone(), err);
        }

        match registry.replace_pipeline(id, Arc::clone(&candidate)) {
            Some(previous) => {
                info!(
                    pipeline = %id,
                    old_hash = %previous.config_hash(),
                    new_hash = %candidate.config_hash(),
                    "pipeline reloaded"
                );
                agent.retire_pipeline(previous);
                ActionResult::success(id.clone())
            }
            None => {
                // Unreachable while the caller honors the exclusivity
                // precondition; stop the started candidate so it cannot leak.
                candidate.shutdown();
                candidate.join();
                ActionResult::failure(
                    id.clone(),
                    FlowhostError::Internal(format!(
                        "pipeline `{id}` disappeared during reload"
                    )),
                )
            }
        }
    }
}
