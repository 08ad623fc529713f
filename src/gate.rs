//! Visibility gate
//!
//! Binds a [`Playback`] to an externally observed "on screen" boolean.
//! The gate never polls; the observer pushes changes through
//! [`VisibilityGate::set_visible`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::playback::Playback;
use crate::timer::TimerSlot;

/// How visibility changes drive playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Start the first time the element becomes visible, then ignore the
    /// signal for good.
    OnceOnly,
    /// Pause when hidden, rewind once hidden for `cooldown`, play again
    /// when visible. Coming back before the cooldown elapses cancels the
    /// pending rewind.
    RestartOnReentry {
        /// Time hidden before the rewind is applied
        cooldown: Duration,
    },
}

impl GatePolicy {
    /// Restart policy with the 1 s cooldown used by the terminal panels.
    pub const RESTART: Self = Self::RestartOnReentry {
        cooldown: Duration::from_secs(1),
    };
}

#[derive(Debug, Default)]
struct GateState {
    visible: bool,
    started: bool,
    rewinds: u64,
}

/// Start/stop/reset control bound to on-screen visibility.
pub struct VisibilityGate<P: Playback + 'static> {
    target: Arc<P>,
    policy: GatePolicy,
    state: Arc<Mutex<GateState>>,
    slot: TimerSlot,
}

impl<P: Playback + 'static> VisibilityGate<P> {
    /// Wraps `target`. The element starts out hidden.
    #[must_use]
    pub fn new(target: Arc<P>, policy: GatePolicy) -> Self {
        Self {
            target,
            policy,
            state: Arc::new(Mutex::new(GateState::default())),
            slot: TimerSlot::new("gate-cooldown"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes a visibility change. Repeating the current value is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn set_visible(&self, visible: bool) {
        let mut state = self.lock();
        if state.visible == visible {
            return;
        }
        state.visible = visible;
        debug!(visible, policy = ?self.policy, "visibility changed");

        match self.policy {
            GatePolicy::OnceOnly => {
                if visible && !state.started {
                    state.started = true;
                    drop(state);
                    self.target.start();
                }
            }
            GatePolicy::RestartOnReentry { cooldown } => {
                if visible {
                    state.started = true;
                    drop(state);
                    // A pending rewind is cancelled by coming back in time.
                    self.slot.disarm();
                    self.target.start();
                } else {
                    drop(state);
                    self.target.stop();
                    if cooldown.is_zero() {
                        self.rewind();
                    } else {
                        let target = Arc::clone(&self.target);
                        let shared = Arc::clone(&self.state);
                        self.slot.arm(move |cancel| async move {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => return,
                                () = tokio::time::sleep(cooldown) => {}
                            }
                            // Held across the reset so a concurrent return
                            // to visible starts the rewound target.
                            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                            if state.visible || cancel.is_cancelled() {
                                return;
                            }
                            state.rewinds += 1;
                            debug!(?cooldown, "cooldown elapsed, rewinding");
                            target.reset();
                        });
                    }
                }
            }
        }
    }

    fn rewind(&self) {
        self.lock().rewinds += 1;
        self.target.reset();
    }

    /// Last pushed visibility.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Whether a rewind is waiting for its cooldown.
    #[must_use]
    pub fn rewind_pending(&self) -> bool {
        self.slot.is_armed()
    }

    /// Number of rewinds applied so far.
    #[must_use]
    pub fn rewinds(&self) -> u64 {
        self.lock().rewinds
    }

    /// Configured policy.
    #[must_use]
    pub const fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// The gated playback.
    #[must_use]
    pub fn target(&self) -> &Arc<P> {
        &self.target
    }
}

impl<P: Playback + 'static> std::fmt::Debug for VisibilityGate<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityGate")
            .field("policy", &self.policy)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}
