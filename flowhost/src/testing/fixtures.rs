//! Test fixtures shared by unit and integration tests.

use crate::config::{PipelineConfig, PipelineSettings, StandardCompiler};
use crate::pipeline::StageKind;
use crate::testing::mocks::{FailingRegistrationStage, NonReloadableIntake};
use std::sync::Arc;

/// A blocking configuration source: a pipeline that idles until shutdown.
pub const BLOCKING_SOURCE: &str = "input { blocking {} } output { null {} }";

/// Builds a configuration with the given settings entries applied on top
/// of defaults.
#[must_use]
pub fn mock_config(
    pipeline_id: &str,
    source: &str,
    entries: &[(&str, serde_json::Value)],
) -> PipelineConfig {
    let mut settings = PipelineSettings::new();
    for (key, value) in entries {
        settings = settings.with_entry(*key, value.clone());
    }
    PipelineConfig::new(pipeline_id, source, settings)
}

/// A compiler with the built-in plugins plus test-only ones:
///
/// - `failing` intake: registration fails with "Bad value"
/// - `pinned` intake: blocks like `blocking` but is not reloadable
#[must_use]
pub fn test_compiler() -> Arc<StandardCompiler> {
    let mut compiler = StandardCompiler::new();
    compiler.register_plugin(StageKind::Intake, "failing", |name, _| {
        Arc::new(FailingRegistrationStage::new(name, "Bad value"))
    });
    compiler.register_plugin(StageKind::Intake, "pinned", |name, _| {
        Arc::new(NonReloadableIntake::new(name))
    });
    Arc::new(compiler)
}
