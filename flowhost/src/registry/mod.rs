//! Concurrency-safe registry of live pipeline instances.
//!
//! The registry is the single shared mutable resource of the host. For a
//! given identifier it holds at most one entry, which is either a live
//! pipeline or a placeholder marking an in-flight creation; the two states
//! are mutually exclusive. All entry transitions happen under one mutex,
//! so readers never observe a torn state, and `replace_pipeline` is a
//! single atomic publish.

use crate::config::PipelineId;
use crate::pipeline::Pipeline;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registry entry: a live pipeline, or a placeholder for one mid-creation.
#[derive(Debug)]
enum RegistryEntry {
    /// A creation is in flight; blocks duplicate creations for the id.
    Loading,
    /// A created/running/stopped pipeline.
    Live(Arc<Pipeline>),
}

/// Concurrency-safe mapping from pipeline identifier to pipeline instance.
///
/// Mutating operations for a given identifier are expected to be totally
/// ordered by the orchestrator's exclusive-access guarantee; the registry's
/// own lock guarantees only that individual operations are atomic and that
/// concurrent creations of one identifier cannot race.
#[derive(Debug, Default)]
pub struct PipelinesRegistry {
    states: Mutex<HashMap<PipelineId, RegistryEntry>>,
}

impl PipelinesRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically creates a pipeline entry for `id`.
    ///
    /// Installs a placeholder, invokes `init` (expected to start the
    /// pipeline), and on success records `pipeline` as the live entry.
    /// On failure the placeholder is removed and the registry is left as
    /// if the call never happened. Returns whether the pipeline was
    /// created; a concurrent call for the same `id` observes "already
    /// present or pending" and returns `false` without side effects.
    ///
    /// `init` runs outside the registry lock and may block for an
    /// unbounded time (an intake binding a listener, for example); callers
    /// wanting an upper bound must impose external cancellation.
    pub fn create_pipeline<F>(&self, id: &PipelineId, pipeline: Arc<Pipeline>, init: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        {
            let mut states = self.states.lock();
            if states.contains_key(id) {
                warn!(pipeline = %id, "create refused: id already present or pending");
                return false;
            }
            states.insert(id.clone(), RegistryEntry::Loading);
        }

        let success = init();

        let mut states = self.states.lock();
        if success {
            debug!(pipeline = %id, "pipeline created");
            states.insert(id.clone(), RegistryEntry::Live(pipeline));
        } else {
            debug!(pipeline = %id, "pipeline creation failed, rolling back placeholder");
            states.remove(id);
        }
        success
    }

    /// Returns the live pipeline for `id`, if any.
    ///
    /// Never returns a placeholder.
    #[must_use]
    pub fn get_pipeline(&self, id: &PipelineId) -> Option<Arc<Pipeline>> {
        match self.states.lock().get(id) {
            Some(RegistryEntry::Live(pipeline)) => Some(Arc::clone(pipeline)),
            _ => None,
        }
    }

    /// Returns a point-in-time snapshot of all running pipelines.
    ///
    /// Iteration order is unspecified. Used by the host for bulk shutdown.
    #[must_use]
    pub fn running_pipelines(&self) -> Vec<(PipelineId, Arc<Pipeline>)> {
        self.states
            .lock()
            .iter()
            .filter_map(|(id, entry)| match entry {
                RegistryEntry::Live(pipeline) if pipeline.running() => {
                    Some((id.clone(), Arc::clone(pipeline)))
                }
                _ => None,
            })
            .collect()
    }

    /// Atomically swaps the live entry for `id`, returning the previous
    /// pipeline so the caller can retire it.
    ///
    /// The swap is a single atomic publish: no other thread can observe
    /// `id` as absent mid-swap. Returns `None` (and installs nothing) if
    /// `id` has no live entry.
    pub fn replace_pipeline(
        &self,
        id: &PipelineId,
        new_pipeline: Arc<Pipeline>,
    ) -> Option<Arc<Pipeline>> {
        let mut states = self.states.lock();
        match states.get_mut(id) {
            Some(entry @ RegistryEntry::Live(_)) => {
                let previous = std::mem::replace(entry, RegistryEntry::Live(new_pipeline));
                debug!(pipeline = %id, "pipeline replaced");
                match previous {
                    RegistryEntry::Live(pipeline) => Some(pipeline),
                    RegistryEntry::Loading => None,
                }
            }
            _ => {
                warn!(pipeline = %id, "replace refused: no live pipeline");
                None
            }
        }
    }

    /// Removes the live entry for `id`, returning it.
    ///
    /// Placeholders are left untouched; a creation in flight owns its own
    /// rollback.
    pub fn remove_pipeline(&self, id: &PipelineId) -> Option<Arc<Pipeline>> {
        let mut states = self.states.lock();
        match states.get(id) {
            Some(RegistryEntry::Live(_)) => match states.remove(id) {
                Some(RegistryEntry::Live(pipeline)) => Some(pipeline),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns the number of entries, placeholders included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.states.lock().len()
    }

    /// Whether the registry has no entries.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, PipelineSettings};
    use crate::pipeline::{GeneratorIntake, NullOutput, Stage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn make_pipeline(id: &str) -> Arc<Pipeline> {
        let config = PipelineConfig::new(
            id,
            "input { generator {} } output { null {} }",
            PipelineSettings::new(),
        );
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(GeneratorIntake::new("gen")),
            Arc::new(NullOutput::new("null")),
        ];
        Arc::new(Pipeline::new(config, stages))
    }

    #[test]
    fn test_create_and_get() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");
        let pipeline = make_pipeline("main");

        assert!(registry.create_pipeline(&id, Arc::clone(&pipeline), || true));
        let found = registry.get_pipeline(&id).expect("pipeline present");
        assert!(Arc::ptr_eq(&found, &pipeline));
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_create_rolls_back_on_failed_init() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");

        assert!(!registry.create_pipeline(&id, make_pipeline("main"), || false));
        assert!(registry.get_pipeline(&id).is_none());
        assert!(registry.empty());
        // A later create for the same id succeeds as if nothing happened.
        assert!(registry.create_pipeline(&id, make_pipeline("main"), || true));
    }

    #[test]
    fn test_duplicate_create_refused() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");

        assert!(registry.create_pipeline(&id, make_pipeline("main"), || true));
        let mut second_init_ran = false;
        assert!(!registry.create_pipeline(&id, make_pipeline("main"), || {
            second_init_ran = true;
            true
        }));
        assert!(!second_init_ran);
    }

    #[test]
    fn test_get_never_returns_placeholder() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");
        let pipeline = make_pipeline("main");

        registry.create_pipeline(&id, Arc::clone(&pipeline), || {
            // Mid-creation: the placeholder must be invisible to readers,
            // but still count as an entry.
            assert!(registry.get_pipeline(&id).is_none());
            assert_eq!(registry.size(), 1);
            true
        });
        assert!(registry.get_pipeline(&id).is_some());
    }

    #[test]
    fn test_placeholder_race_exactly_one_winner() {
        let registry = Arc::new(PipelinesRegistry::new());
        let id = PipelineId::new("main");
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    if registry.create_pipeline(&id, make_pipeline("main"), || true) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread join");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_replace_returns_previous() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");
        let first = make_pipeline("main");
        let second = make_pipeline("main");

        registry.create_pipeline(&id, Arc::clone(&first), || true);
        let previous = registry
            .replace_pipeline(&id, Arc::clone(&second))
            .expect("previous pipeline");
        assert!(Arc::ptr_eq(&previous, &first));

        let current = registry.get_pipeline(&id).expect("pipeline present");
        assert!(Arc::ptr_eq(&current, &second));
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_replace_without_live_entry_is_a_noop() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("ghost");
        assert!(registry.replace_pipeline(&id, make_pipeline("ghost")).is_none());
        assert!(registry.empty());
    }

    #[test]
    fn test_running_pipelines_snapshot() {
        let registry = PipelinesRegistry::new();
        let running_id = PipelineId::new("running");
        let idle_id = PipelineId::new("idle");
        let running = make_pipeline("running");
        let idle = make_pipeline("idle");

        registry.create_pipeline(&running_id, Arc::clone(&running), || {
            running.start().is_ok()
        });
        registry.create_pipeline(&idle_id, Arc::clone(&idle), || true);

        let snapshot = registry.running_pipelines();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, running_id);

        running.shutdown();
        running.join();
        assert!(registry.running_pipelines().is_empty());
    }

    #[test]
    fn test_remove_pipeline() {
        let registry = PipelinesRegistry::new();
        let id = PipelineId::new("main");
        let pipeline = make_pipeline("main");

        registry.create_pipeline(&id, Arc::clone(&pipeline), || true);
        let removed = registry.remove_pipeline(&id).expect("removed");
        assert!(Arc::ptr_eq(&removed, &pipeline));
        assert!(registry.empty());
        assert!(registry.remove_pipeline(&id).is_none());
    }
}
