//! Stage trait and built-in plugin implementations.
//!
//! Stages are the constituent units of a pipeline: intakes produce events,
//! transforms rewrite them, outputs dispatch them. The registration phase
//! (`register`) is the seam where startup may fail or block; the reload
//! machinery treats any registration error as grounds to discard a
//! candidate pipeline without touching the running one.

use crate::errors::StageError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// The role a stage plays in the event flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A stage that brings events into the pipeline.
    Intake,
    /// A stage that rewrites or drops events.
    Transform,
    /// A stage that dispatches events out of the pipeline.
    Output,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intake => write!(f, "intake"),
            Self::Transform => write!(f, "transform"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A single unit of data flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event(serde_json::Value);

impl Event {
    /// Creates a new event from a JSON value.
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the event payload.
    #[must_use]
    pub const fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Trait for pipeline stages.
///
/// `register` runs once before the pipeline's worker thread starts and may
/// block for an unbounded time (an intake binding a listener, for example).
/// `close` must be safe to call from another thread and must release
/// whatever `register`/`poll` are blocked on.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns the stage's role.
    fn kind(&self) -> StageKind;

    /// Runs the stage's registration phase.
    fn register(&self) -> Result<(), StageError>;

    /// Requests the stage to stop; idempotent.
    fn close(&self);

    /// Whether the stage is safe to hot-swap.
    fn reloadable(&self) -> bool {
        true
    }

    /// Produces the next event, if any. Only meaningful for intakes.
    ///
    /// May block until `close` is called; returns `None` once the stage
    /// has nothing further to produce.
    fn poll(&self) -> Option<Event> {
        None
    }

    /// Rewrites an event. Only meaningful for transforms; returning `None`
    /// drops the event.
    fn transform(&self, event: Event) -> Option<Event> {
        Some(event)
    }

    /// Dispatches an event. Only meaningful for outputs.
    fn publish(&self, _event: &Event) {}
}

/// An intake that emits synthetic sequence-numbered events until closed.
#[derive(Debug)]
pub struct GeneratorIntake {
    name: String,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl GeneratorIntake {
    /// Creates a new generator intake.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns how many events have been emitted.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Stage for GeneratorIntake {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Intake
    }

    fn register(&self) -> Result<(), StageError> {
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn poll(&self) -> Option<Event> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        // Pace emission so an idle host does not spin a core.
        std::thread::sleep(Duration::from_millis(1));
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        Some(Event::new(serde_json::json!({
            "generator": self.name,
            "sequence": seq,
        })))
    }
}

/// An intake that parks until closed and never produces an event.
///
/// The moral equivalent of a network listener with no traffic; used to
/// exercise long-lived pipelines whose intakes block between events.
#[derive(Debug)]
pub struct BlockingIntake {
    name: String,
    closed: Mutex<bool>,
    released: Condvar,
}

impl BlockingIntake {
    /// Creates a new blocking intake.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            closed: Mutex::new(false),
            released: Condvar::new(),
        }
    }
}

impl Stage for BlockingIntake {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Intake
    }

    fn register(&self) -> Result<(), StageError> {
        Ok(())
    }

    fn close(&self) {
        let mut closed = self.closed.lock();
        *closed = true;
        self.released.notify_all();
    }

    fn poll(&self) -> Option<Event> {
        let mut closed = self.closed.lock();
        while !*closed {
            self.released.wait(&mut closed);
        }
        None
    }
}

/// A transform that passes every event through unchanged.
#[derive(Debug)]
pub struct NoopTransform {
    name: String,
}

impl NoopTransform {
    /// Creates a new no-op transform.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for NoopTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    fn register(&self) -> Result<(), StageError> {
        Ok(())
    }

    fn close(&self) {}
}

/// An output that discards every event.
#[derive(Debug)]
pub struct NullOutput {
    name: String,
}

impl NullOutput {
    /// Creates a new null output.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for NullOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Output
    }

    fn register(&self) -> Result<(), StageError> {
        Ok(())
    }

    fn close(&self) {}

    fn publish(&self, _event: &Event) {
        // Intentionally empty - discards all events
    }
}

/// An output that writes each event as a JSON line to stdout.
#[derive(Debug)]
pub struct StdoutOutput {
    name: String,
}

impl StdoutOutput {
    /// Creates a new stdout output.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for StdoutOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Output
    }

    fn register(&self) -> Result<(), StageError> {
        Ok(())
    }

    fn close(&self) {}

    fn publish(&self, event: &Event) {
        println!("{}", event.payload());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_generator_emits_sequenced_events() {
        let intake = GeneratorIntake::new("gen");
        let first = intake.poll().map(|e| e.payload().clone());
        let second = intake.poll().map(|e| e.payload().clone());
        assert_eq!(first.and_then(|v| v["sequence"].as_u64()), Some(0));
        assert_eq!(second.and_then(|v| v["sequence"].as_u64()), Some(1));
        intake.close();
        assert!(intake.poll().is_none());
    }

    #[test]
    fn test_blocking_intake_releases_on_close() {
        let intake = Arc::new(BlockingIntake::new("blocking"));
        let polled = {
            let intake = Arc::clone(&intake);
            std::thread::spawn(move || intake.poll())
        };
        // Give the poller a moment to park before releasing it.
        std::thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        intake.close();
        assert!(polled.join().map(|e| e.is_none()).unwrap_or(false));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_default_transform_passes_through() {
        let transform = NoopTransform::new("noop");
        let event = Event::new(serde_json::json!({"k": "v"}));
        assert_eq!(transform.transform(event.clone()), Some(event));
    }
}
