//! # Flowhost
//!
//! A long-running data pipeline host with safe hot reloads.
//!
//! Flowhost keeps named pipelines running and lets operators swap a
//! pipeline for a newly-configured version without stopping the host:
//!
//! - **Pipelines registry**: a concurrency-safe mapping from pipeline
//!   identifier to live instance, with placeholder entries preventing
//!   duplicate concurrent creation
//! - **Pipeline actions**: create, reload, and stop, executed under the
//!   agent's exclusive-access guarantee
//! - **Atomic reloads**: a reload validates, compiles, and starts the
//!   replacement before publishing it; a failed reload never touches the
//!   running pipeline
//! - **Tracked retirement**: replaced pipelines shut down on detached
//!   threads the host can still drain deterministically
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowhost::prelude::*;
//!
//! let agent = Agent::new();
//! let compiler = Arc::new(StandardCompiler::new());
//!
//! let config = PipelineConfig::new(
//!     "main",
//!     "input { generator {} } output { stdout {} }",
//!     PipelineSettings::new(),
//! );
//! let result = agent.execute_action(&PipelineAction::create(config, compiler.clone()));
//! assert!(result.successful());
//!
//! // Later: hot-swap the pipeline for a new configuration.
//! let new_config = PipelineConfig::new(
//!     "main",
//!     "input { generator {} } filter { noop {} } output { null {} }",
//!     PipelineSettings::new(),
//! );
//! let result = agent.execute_action(&PipelineAction::reload(new_config, compiler));
//! assert!(result.successful());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod agent;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{ActionResult, ActionResultSummary, Create, PipelineAction, Reload, Stop};
    pub use crate::agent::Agent;
    pub use crate::config::{
        Fingerprint, PipelineCompiler, PipelineConfig, PipelineId, PipelineSettings,
        StandardCompiler,
    };
    pub use crate::errors::{
        ConfigurationError, FlowhostError, InitializationError, NotReloadableError, StageError,
    };
    pub use crate::pipeline::{Event, Pipeline, PipelineState, Stage, StageKind};
    pub use crate::registry::PipelinesRegistry;
}
