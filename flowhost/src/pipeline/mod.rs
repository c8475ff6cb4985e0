//! Pipeline instances and their lifecycle.
//!
//! A [`Pipeline`] owns its compiled stages and a dedicated worker thread
//! driving the event loop. Lifecycle: `Created → Running → Stopped`.
//! Exactly one registry entry owns a pipeline instance at any time; the
//! reload machinery never retains a second live reference after a swap.

mod stage;

pub use stage::{
    BlockingIntake, Event, GeneratorIntake, NoopTransform, NullOutput, Stage, StageKind,
    StdoutOutput,
};

use crate::config::{Fingerprint, PipelineConfig, PipelineId};
use crate::errors::InitializationError;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observable lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Compiled but not yet started.
    Created,
    /// The worker thread is driving the event loop.
    Running,
    /// Shutdown has completed and the event loop has exited.
    Stopped,
}

#[derive(Debug)]
struct LifecycleCell {
    state: Mutex<PipelineState>,
    changed: Condvar,
    shutdown_requested: AtomicBool,
}

impl LifecycleCell {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipelineState::Created),
            changed: Condvar::new(),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    fn get(&self) -> PipelineState {
        *self.state.lock()
    }

    fn set(&self, state: PipelineState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

/// A runnable data-processing pipeline.
///
/// Constructed by the compiler collaborator from a [`PipelineConfig`];
/// started at most once. `shutdown` is idempotent and safe to call from
/// any thread.
pub struct Pipeline {
    id: PipelineId,
    config: PipelineConfig,
    stages: Vec<Arc<dyn Stage>>,
    lifecycle: Arc<LifecycleCell>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline from a configuration and its compiled stages.
    #[must_use]
    pub fn new(config: PipelineConfig, stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            id: config.pipeline_id().clone(),
            config,
            stages,
            lifecycle: Arc::new(LifecycleCell::new()),
            worker: Mutex::new(None),
        }
    }

    /// Returns the pipeline identifier.
    #[must_use]
    pub const fn id(&self) -> &PipelineId {
        &self.id
    }

    /// Returns the configuration this pipeline was compiled from.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the configuration fingerprint.
    #[must_use]
    pub const fn config_hash(&self) -> &Fingerprint {
        self.config.config_hash()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.lifecycle.get()
    }

    /// Whether the worker thread is driving the event loop.
    #[must_use]
    pub fn running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Whether the pipeline has fully stopped.
    #[must_use]
    pub fn stopped(&self) -> bool {
        self.state() == PipelineState::Stopped
    }

    /// Whether this pipeline may be hot-swapped.
    ///
    /// True only if the configuration permits it and every stage declares
    /// itself safely restartable.
    #[must_use]
    pub fn reloadable(&self) -> bool {
        self.config.reloadable() && self.stages.iter().all(|s| s.reloadable())
    }

    /// Starts the pipeline: registers every stage, then spawns the worker
    /// thread.
    ///
    /// Registration runs in declaration order and may block for an
    /// unbounded time (an intake binding a listener, for example); no
    /// timeout is imposed here. On any registration failure, stages that
    /// already registered are closed in reverse order and the pipeline is
    /// left stopped, never published.
    pub fn start(&self) -> Result<(), InitializationError> {
        if self.state() != PipelineState::Created {
            return Err(InitializationError::new(
                self.id.as_str(),
                "pipeline was already started",
            ));
        }

        debug!(pipeline = %self.id, stages = self.stages.len(), "registering stages");
        for (index, stage) in self.stages.iter().enumerate() {
            if let Err(err) = stage.register() {
                warn!(pipeline = %self.id, stage = stage.name(), %err, "stage registration failed");
                for registered in self.stages[..index].iter().rev() {
                    registered.close();
                }
                self.lifecycle.set(PipelineState::Stopped);
                return Err(InitializationError::new(self.id.as_str(), err.message.clone())
                    .in_stage(stage.name()));
            }
        }

        let stages = self.stages.clone();
        let lifecycle = Arc::clone(&self.lifecycle);
        let id = self.id.clone();
        let handle = std::thread::Builder::new()
            .name(format!("pipeline-{id}"))
            .spawn(move || run_event_loop(&id, &stages, &lifecycle))
            .map_err(|err| {
                for stage in self.stages.iter().rev() {
                    stage.close();
                }
                self.lifecycle.set(PipelineState::Stopped);
                InitializationError::new(self.id.as_str(), format!("worker spawn failed: {err}"))
            })?;

        *self.worker.lock() = Some(handle);
        self.lifecycle.set(PipelineState::Running);
        info!(pipeline = %self.id, hash = %self.config_hash(), "pipeline started");
        Ok(())
    }

    /// Requests shutdown: sets the stop flag and closes every stage.
    ///
    /// Returns immediately; the pipeline reaches `Stopped` once the worker
    /// thread observes the request and exits. Idempotent.
    pub fn shutdown(&self) {
        if self.lifecycle.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(pipeline = %self.id, "shutdown requested");
        for stage in self.stages.iter().rev() {
            stage.close();
        }
        // A pipeline that never started has no worker to flip the state.
        if self.state() == PipelineState::Created {
            self.lifecycle.set(PipelineState::Stopped);
        }
    }

    /// Joins the worker thread, if one was spawned.
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(pipeline = %self.id, "worker thread panicked");
                self.lifecycle.set(PipelineState::Stopped);
            }
        }
    }

    /// Blocks until the pipeline reaches `Stopped`, up to `timeout`.
    ///
    /// Returns whether the pipeline stopped within the deadline.
    #[must_use]
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let mut state = self.lifecycle.state.lock();
        while *state != PipelineState::Stopped {
            if self
                .lifecycle
                .changed
                .wait_for(&mut state, timeout)
                .timed_out()
            {
                return *state == PipelineState::Stopped;
            }
        }
        true
    }
}

/// The worker event loop: polls intakes, runs transforms, dispatches to
/// outputs, until shutdown is requested.
fn run_event_loop(id: &PipelineId, stages: &[Arc<dyn Stage>], lifecycle: &LifecycleCell) {
    let intakes: Vec<_> = stages
        .iter()
        .filter(|s| s.kind() == StageKind::Intake)
        .collect();
    let transforms: Vec<_> = stages
        .iter()
        .filter(|s| s.kind() == StageKind::Transform)
        .collect();
    let outputs: Vec<_> = stages
        .iter()
        .filter(|s| s.kind() == StageKind::Output)
        .collect();

    debug!(pipeline = %id, "event loop started");
    while !lifecycle.shutdown_requested.load(Ordering::SeqCst) {
        let mut idle = true;
        for intake in &intakes {
            if lifecycle.shutdown_requested.load(Ordering::SeqCst) {
                break;
            }
            let Some(event) = intake.poll() else {
                continue;
            };
            idle = false;
            let mut current = Some(event);
            for transform in &transforms {
                match current.take().and_then(|e| transform.transform(e)) {
                    Some(next) => current = Some(next),
                    None => break,
                }
            }
            if let Some(event) = current {
                for output in &outputs {
                    output.publish(&event);
                }
            }
        }
        if idle {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    lifecycle.set(PipelineState::Stopped);
    debug!(pipeline = %id, "event loop exited");
}
