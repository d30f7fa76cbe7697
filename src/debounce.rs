//! Per-kind write coalescing.
//!
//! Every kind has at most one pending save. Scheduling again for the same kind
//! replaces the pending action and restarts its quiet period; when a quiet
//! period runs out the action is run once on the save worker thread.

use crate::{CatalogError, EntityKind, StoreError, statics};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Deferred persist call. Errors are logged by the worker, never propagated.
pub type PersistAction = Box<dyn FnOnce() -> Result<(), StoreError> + Send>;

struct PendingSave {
    deadline: Instant,
    action: PersistAction,
}

#[derive(Default)]
struct State {
    pending: HashMap<EntityKind, PendingSave>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

pub struct SaveDebouncer {
    shared: Arc<Shared>,
    quiet_period: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SaveDebouncer {
    pub fn new(quiet_period: Duration) -> Result<Self, CatalogError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wake: Condvar::new(),
        });

        let worker = thread::Builder::new()
            .name(statics::SAVE_WORKER_THREAD.to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker(&shared)
            })
            .map_err(CatalogError::Worker)?;

        Ok(Self {
            shared,
            quiet_period,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Cancels any pending save for `kind` and starts a new quiet period for `action`.
    pub fn schedule(&self, kind: EntityKind, action: PersistAction) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            tracing::debug!(%kind, "save worker stopped; dropping scheduled save");
            return;
        }

        let deadline = Instant::now() + self.quiet_period;
        if state
            .pending
            .insert(kind, PendingSave { deadline, action })
            .is_some()
        {
            tracing::trace!(%kind, "superseded pending save");
        } else {
            tracing::debug!(%kind, delay_ms = self.quiet_period.as_millis() as u64, "save scheduled");
        }
        self.shared.wake.notify_one();
    }

    /// Drops the pending save for `kind`. Returns whether one was pending.
    pub fn cancel(&self, kind: EntityKind) -> bool {
        self.shared.state.lock().pending.remove(&kind).is_some()
    }

    /// Drops every pending save. Returns the kinds that were pending.
    pub fn cancel_all(&self) -> Vec<EntityKind> {
        let mut state = self.shared.state.lock();
        let mut kinds: Vec<EntityKind> = state.pending.drain().map(|(kind, _)| kind).collect();
        kinds.sort();
        kinds
    }

    pub fn is_pending(&self, kind: EntityKind) -> bool {
        self.shared.state.lock().pending.contains_key(&kind)
    }

    pub fn pending_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.shared.state.lock().pending.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Cancels all pending saves and stops the worker.
    ///
    /// Pending saves are discarded, not run; callers flush explicitly afterwards.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            if !state.pending.is_empty() {
                tracing::debug!(count = state.pending.len(), "discarding pending saves at shutdown");
                state.pending.clear();
            }
        }
        self.shared.wake.notify_all();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        // The last handle can be dropped by an action running on the worker itself.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            tracing::error!("save worker exited with a panic");
        }
    }
}

impl Drop for SaveDebouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }

        let due = take_due(&mut state, Instant::now());
        if !due.is_empty() {
            MutexGuard::unlocked(&mut state, || {
                for (kind, action) in due {
                    run_action(kind, action);
                }
            });
            continue;
        }

        match state.pending.values().map(|p| p.deadline).min() {
            Some(deadline) => {
                shared.wake.wait_until(&mut state, deadline);
            }
            None => shared.wake.wait(&mut state),
        }
    }
}

/// Removes every expired entry, oldest deadline first.
fn take_due(state: &mut State, now: Instant) -> Vec<(EntityKind, PersistAction)> {
    let kinds: Vec<EntityKind> = state
        .pending
        .iter()
        .filter(|(_, p)| p.deadline <= now)
        .map(|(kind, _)| *kind)
        .collect();

    let mut due: Vec<(Instant, EntityKind, PersistAction)> = kinds
        .into_iter()
        .filter_map(|kind| {
            let p = state.pending.remove(&kind)?;
            Some((p.deadline, kind, p.action))
        })
        .collect();
    due.sort_by_key(|(deadline, kind, _)| (*deadline, *kind));
    due.into_iter().map(|(_, kind, action)| (kind, action)).collect()
}

fn run_action(kind: EntityKind, action: PersistAction) {
    match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(())) => tracing::debug!(%kind, "debounced save completed"),
        Ok(Err(err)) => {
            tracing::warn!(%kind, error = %err, "debounced save failed; will retry on next change")
        }
        Err(_) => tracing::error!(%kind, "debounced save panicked"),
    }
}
