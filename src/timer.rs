//! Single-owner timer handle.
//!
//! Every typewriter, ramp, gate and sequencer owns exactly one
//! [`TimerSlot`]. Arming the slot cancels whatever task it held before
//! spawning the new one, and dropping the slot cancels its task, so a
//! component can never leave an orphaned timer writing into its state.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Armed {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Holder for at most one running timer task.
pub struct TimerSlot {
    label: &'static str,
    armed: Mutex<Option<Armed>>,
}

impl TimerSlot {
    /// Creates an empty slot. `label` only appears in trace logs.
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            armed: Mutex::new(None),
        }
    }

    /// Cancels the current task (if any) and spawns `task` in its place.
    ///
    /// The task receives the token that guards it; it must check the token
    /// after every await point before touching shared state.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn arm<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = armed.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task(cancel.clone()));
        trace!(slot = self.label, "timer armed");
        *armed = Some(Armed { cancel, handle });
    }

    /// Cancels the current task. Idempotent.
    pub fn disarm(&self) {
        let previous = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
            previous.handle.abort();
            trace!(slot = self.label, "timer disarmed");
        }
    }

    /// Whether a task is armed and has not finished yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|armed| !armed.cancel.is_cancelled() && !armed.handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("label", &self.label)
            .field("armed", &self.is_armed())
            .finish()
    }
}
