//! The agent: owns the registry and serializes action execution.
//!
//! The agent provides the host's exclusive-access guarantee: one global
//! re-entrant lock under which every mutating action runs, regardless of
//! which pipeline it targets. It also tracks the detached threads that
//! retire replaced pipelines, so host-wide shutdown can wait on them
//! deterministically instead of abandoning the resources.

use crate::actions::{ActionResult, PipelineAction};
use crate::pipeline::Pipeline;
use crate::registry::PipelinesRegistry;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Serializes registry mutation and owns pipeline teardown bookkeeping.
#[derive(Default)]
pub struct Agent {
    registry: Arc<PipelinesRegistry>,
    // Re-entrant so an action may call back into `exclusive` from the
    // dispatching thread without deadlocking; other threads block until
    // the holder releases it.
    exclusive_lock: ReentrantMutex<()>,
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl Agent {
    /// Creates an agent with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an agent around an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<PipelinesRegistry>) -> Self {
        Self {
            registry,
            exclusive_lock: ReentrantMutex::new(()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Returns the registry this agent owns.
    #[must_use]
    pub fn registry(&self) -> &Arc<PipelinesRegistry> {
        &self.registry
    }

    /// Runs `f` under the exclusive-access guarantee.
    ///
    /// Mutual exclusion holds against all other `exclusive` calls on this
    /// agent; re-entrant calls from the same thread proceed without
    /// deadlock. All mutating registry operations are totally ordered by
    /// this lock.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.exclusive_lock.lock();
        f()
    }

    /// Executes one action under the exclusive-access guarantee.
    pub fn execute_action(&self, action: &PipelineAction) -> ActionResult {
        debug!(%action, "executing pipeline action");
        let result = self.exclusive(|| action.execute(self, &self.registry));
        if result.successful() {
            info!(%action, "pipeline action succeeded");
        } else {
            error!(
                %action,
                message = %result.message().unwrap_or_default(),
                "pipeline action failed"
            );
        }
        result
    }

    /// Executes a batch of actions sequentially, returning their results.
    pub fn converge(&self, actions: &[PipelineAction]) -> Vec<ActionResult> {
        actions.iter().map(|a| self.execute_action(a)).collect()
    }

    /// Retires a replaced pipeline: fire-and-forget shutdown-then-join on
    /// a detached thread, tracked for deterministic draining.
    pub fn retire_pipeline(&self, pipeline: Arc<Pipeline>) {
        let id = pipeline.id().clone();
        debug!(pipeline = %id, "retiring pipeline");
        let spawned = std::thread::Builder::new()
            .name(format!("retire-{id}"))
            .spawn(move || {
                pipeline.shutdown();
                pipeline.join();
                debug!(pipeline = %id, "retired pipeline fully stopped");
            });
        match spawned {
            Ok(handle) => self.retired.lock().push(handle),
            Err(err) => warn!(%err, "failed to spawn retirement thread"),
        }
    }

    /// Joins every tracked retirement thread.
    pub fn drain_retired(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.retired.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("retirement thread panicked");
            }
        }
    }

    /// Stops every running pipeline and drains retirement threads.
    ///
    /// Intended for host-wide shutdown; blocks until all pipeline worker
    /// threads have joined.
    pub fn shutdown(&self) {
        let running = self.registry.running_pipelines();
        info!(pipelines = running.len(), "shutting down running pipelines");
        for (_, pipeline) in &running {
            pipeline.shutdown();
        }
        for (_, pipeline) in &running {
            pipeline.join();
        }
        self.drain_retired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, PipelineSettings, StandardCompiler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn source() -> &'static str {
        "input { blocking {} } output { null {} }"
    }

    #[test]
    fn test_exclusive_is_reentrant_on_one_thread() {
        let agent = Agent::new();
        let value = agent.exclusive(|| agent.exclusive(|| 42));
        assert_eq!(value, 42);
    }

    #[test]
    fn test_exclusive_blocks_other_threads() {
        let agent = Arc::new(Agent::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let agent = Arc::clone(&agent);
                let concurrent = Arc::clone(&concurrent);
                let peak = Arc::clone(&peak);
                std::thread::spawn(move || {
                    agent.exclusive(|| {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread join");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_then_shutdown() {
        let agent = Agent::new();
        let compiler = Arc::new(StandardCompiler::new());
        let config = PipelineConfig::new("main", source(), PipelineSettings::new());

        let result = agent.execute_action(&PipelineAction::create(config, compiler));
        assert!(result.successful());
        assert_eq!(agent.registry().running_pipelines().len(), 1);

        agent.shutdown();
        assert!(agent.registry().running_pipelines().is_empty());
    }

    #[test]
    fn test_retire_pipeline_drains() {
        let agent = Agent::new();
        let compiler = Arc::new(StandardCompiler::new());
        let config = PipelineConfig::new("main", source(), PipelineSettings::new());
        agent.execute_action(&PipelineAction::create(config, compiler));

        let pipeline = agent
            .registry()
            .remove_pipeline(&"main".into())
            .expect("pipeline present");
        agent.retire_pipeline(Arc::clone(&pipeline));
        agent.drain_retired();
        assert!(pipeline.stopped());
    }

    #[test]
    fn test_converge_runs_all_actions() {
        let agent = Agent::new();
        let compiler: Arc<StandardCompiler> = Arc::new(StandardCompiler::new());
        let actions = vec![
            PipelineAction::create(
                PipelineConfig::new("a", source(), PipelineSettings::new()),
                compiler.clone(),
            ),
            PipelineAction::create(
                PipelineConfig::new("b", source(), PipelineSettings::new()),
                compiler.clone(),
            ),
            PipelineAction::stop("missing"),
        ];

        let results = agent.converge(&actions);
        assert_eq!(results.len(), 3);
        assert!(results[0].successful());
        assert!(results[1].successful());
        assert!(!results[2].successful());

        agent.shutdown();
    }
}
