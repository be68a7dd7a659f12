// Keyed single-flight registry for spawned work.
//
// Disposing a handle stops a task at its next suspension point, but it
// cannot unqueue a result the task already sent. Receipt-side staleness
// checks against the generation returned by `set` are the second half of
// cancellation; both guards together make replacement race-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::AbortHandle;

use crate::actions::ComposeKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TaskKey {
    ClockCalibration,
    TemporaryPasswordExpiry,
    Compose(ComposeKind),
}

/// One outstanding piece of spawned work. `dispose` is idempotent and safe
/// on handles whose task already completed.
pub(crate) struct CancelHandle {
    alive: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            abort: None,
        }
    }

    /// Flag the spawned task polls before sending its result.
    pub(crate) fn alive(&self) -> Arc<AtomicBool> {
        self.alive.clone()
    }

    pub(crate) fn dispose(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

struct TaskEntry {
    generation: u64,
    handle: CancelHandle,
}

#[derive(Default)]
pub(crate) struct TaskRegistry {
    entries: HashMap<TaskKey, TaskEntry>,
    next_generation: u64,
}

impl TaskRegistry {
    /// Stores `handle` under `key`, disposing whatever was there before, and
    /// returns the generation token results of the new task must carry.
    pub(crate) fn set(&mut self, key: TaskKey, handle: CancelHandle) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(mut old) = self.entries.insert(key, TaskEntry { generation, handle }) {
            old.handle.dispose();
        }
        generation
    }

    /// Binds the spawned task's abort handle after the fact. Both calls
    /// happen back to back on the actor thread, so a mismatched generation
    /// only occurs for a task that was already replaced; abort it outright.
    pub(crate) fn attach_abort(&mut self, key: TaskKey, generation: u64, abort: AbortHandle) {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.generation == generation => entry.handle.abort = Some(abort),
            _ => abort.abort(),
        }
    }

    pub(crate) fn is_current(&self, key: TaskKey, generation: u64) -> bool {
        self.entries
            .get(&key)
            .map(|e| e.generation == generation)
            .unwrap_or(false)
    }

    /// Removes a completed entry so the map never accumulates dead handles.
    /// Stale generations are ignored; the key may already belong to a newer
    /// task.
    pub(crate) fn finish(&mut self, key: TaskKey, generation: u64) {
        if self.is_current(key, generation) {
            self.entries.remove(&key);
        }
    }

    /// Disposes and removes the task under `key`; no-op for an unset key.
    pub(crate) fn cancel(&mut self, key: TaskKey) {
        if let Some(mut entry) = self.entries.remove(&key) {
            entry.handle.dispose();
        }
    }

    /// Context teardown: dispose everything and clear the map.
    pub(crate) fn dispose_all(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            entry.handle.dispose();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
