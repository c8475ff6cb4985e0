//! Pipeline actions: the units of work that mutate the registry.
//!
//! Actions are a closed set of variants dispatched through the
//! [`PipelineAction`] enum; there is no open-ended action hierarchy. Every
//! action exposes the identifier it targets and a single side-effecting
//! `execute` entry point. By convention the caller (the agent) wraps
//! `execute` in its exclusive-access guarantee; actions perform no locking
//! of their own beyond what the registry intrinsically provides.

mod create;
mod reload;
mod result;
mod stop;

pub use create::Create;
pub use reload::Reload;
pub use result::{ActionResult, ActionResultSummary};
pub use stop::Stop;

use crate::agent::Agent;
use crate::config::{PipelineCompiler, PipelineConfig, PipelineId};
use crate::registry::PipelinesRegistry;
use std::fmt;
use std::sync::Arc;

/// A unit of work that reads or mutates the registry.
///
/// Closed variant set: `Create`, `Reload`, `Stop`.
pub enum PipelineAction {
    /// Create and start a new pipeline.
    Create(Create),
    /// Hot-swap a running pipeline for a newly-configured one.
    Reload(Reload),
    /// Stop a pipeline and remove it.
    Stop(Stop),
}

impl PipelineAction {
    /// Builds a create action.
    #[must_use]
    pub fn create(config: PipelineConfig, compiler: Arc<dyn PipelineCompiler>) -> Self {
        Self::Create(Create::new(config, compiler))
    }

    /// Builds a reload action.
    #[must_use]
    pub fn reload(config: PipelineConfig, compiler: Arc<dyn PipelineCompiler>) -> Self {
        Self::Reload(Reload::new(config, compiler))
    }

    /// Builds a stop action.
    #[must_use]
    pub fn stop(pipeline_id: impl Into<PipelineId>) -> Self {
        Self::Stop(Stop::new(pipeline_id))
    }

    /// The identifier this action targets, readable before and after
    /// execution.
    #[must_use]
    pub const fn pipeline_id(&self) -> &PipelineId {
        match self {
            Self::Create(action) => action.pipeline_id(),
            Self::Reload(action) => action.pipeline_id(),
            Self::Stop(action) => action.pipeline_id(),
        }
    }

    /// Executes the action against the registry.
    ///
    /// The agent is expected to wrap this call in its exclusive-access
    /// guarantee whenever the action observes-then-mutates the registry.
    #[must_use]
    pub fn execute(&self, agent: &Agent, registry: &PipelinesRegistry) -> ActionResult {
        match self {
            Self::Create(action) => action.execute(agent, registry),
            Self::Reload(action) => action.execute(agent, registry),
            Self::Stop(action) => action.execute(agent, registry),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Reload(_) => "reload",
            Self::Stop(_) => "stop",
        }
    }
}

impl fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.kind(), self.pipeline_id())
    }
}

impl fmt::Debug for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineAction")
            .field("kind", &self.kind())
            .field("pipeline_id", self.pipeline_id())
            .finish()
    }
}
