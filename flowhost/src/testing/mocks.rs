//! Mock stages for testing.

use crate::errors::StageError;
use crate::pipeline::{Event, Stage, StageKind};
use parking_lot::Mutex;

/// A stage whose registration always fails with a configurable message.
#[derive(Debug)]
pub struct FailingRegistrationStage {
    name: String,
    message: String,
}

impl FailingRegistrationStage {
    /// Creates a stage that fails registration with `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Stage for FailingRegistrationStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Intake
    }

    fn register(&self) -> Result<(), StageError> {
        Err(StageError::new(&self.name, &self.message))
    }

    fn close(&self) {}
}

/// An intake that declares itself unsafe to hot-swap.
#[derive(Debug)]
pub struct NonReloadableIntake {
    inner: crate::pipeline::BlockingIntake,
}

impl NonReloadableIntake {
    /// Creates a new non-reloadable intake.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: crate::pipeline::BlockingIntake::new(name),
        }
    }
}

impl Stage for NonReloadableIntake {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> StageKind {
        StageKind::Intake
    }

    fn register(&self) -> Result<(), StageError> {
        self.inner.register()
    }

    fn close(&self) {
        self.inner.close();
    }

    fn reloadable(&self) -> bool {
        false
    }

    fn poll(&self) -> Option<Event> {
        self.inner.poll()
    }
}

/// An output that records every event it receives.
#[derive(Debug)]
pub struct RecordingOutput {
    name: String,
    events: Mutex<Vec<Event>>,
}

impl RecordingOutput {
    /// Creates a new recording output.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of events received.
    #[must_use]
    pub fn received(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns a copy of the received events.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl Stage for RecordingOutput {
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
        self.events.lock().push(event.clone());
    }
}
