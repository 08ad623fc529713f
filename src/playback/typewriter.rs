//! Time-driven typewriter.
//!
//! A [`Typewriter`] walks a [`PlaybackCursor`] through one script on its
//! own timer. Observers either watch the latest [`TypewriterSnapshot`]
//! or subscribe to the full [`PlaybackEvent`] stream.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::observability::metrics;
use crate::script::Script;
use crate::timer::TimerSlot;

use super::cursor::{self, PlaybackCursor, Step, TypewriterTiming};

/// Discrete playback event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// One more character (or line) became visible
    Revealed {
        /// Cursor after the reveal
        cursor: PlaybackCursor,
        /// Revealed text of the current line
        text: String,
    },
    /// A line finished and the cursor moved past it
    LineCompleted {
        /// Index of the finished line
        line_index: usize,
        /// Full text of the finished line
        text: String,
    },
    /// A repeating typewriter went back to its first line
    Wrapped {
        /// Number of completed passes so far
        cycle: u64,
    },
    /// The script was played through
    Complete,
    /// The cursor was returned to the start
    Reset,
}

/// Latest observable typewriter state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypewriterSnapshot {
    /// Current cursor
    pub cursor: PlaybackCursor,
    /// Revealed text of the current line
    pub text: String,
    /// Whether the timer is ticking
    pub running: bool,
    /// Whether the script has been played through
    pub complete: bool,
    /// Completed passes of a repeating typewriter
    pub cycle: u64,
}

struct Inner {
    script: Script,
    timing: TypewriterTiming,
    cursor: PlaybackCursor,
    complete: bool,
    running: bool,
    cycle: u64,
}

impl Inner {
    fn snapshot(&self) -> TypewriterSnapshot {
        TypewriterSnapshot {
            cursor: self.cursor,
            text: self.cursor.revealed_text(&self.script).to_string(),
            running: self.running,
            complete: self.complete,
            cycle: self.cycle,
        }
    }
}

struct Shared {
    label: String,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<TypewriterSnapshot>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PlaybackEvent>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner, events: Vec<PlaybackEvent>) {
        self.snapshot.send_replace(inner.snapshot());
        if events.is_empty() {
            return;
        }
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for event in events {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Applies one step. Returns `false` once playback is over or the
    /// tick was cancelled.
    ///
    /// `stop` and `reset` cancel before taking the lock, so checking the
    /// token under the lock keeps a late tick off a rewound cursor.
    fn apply(&self, step: Step, cancel: &CancellationToken) -> bool {
        let mut inner = self.lock();
        if cancel.is_cancelled() {
            return false;
        }
        let before = inner.cursor;
        let mut events = Vec::new();

        match step {
            Step::Finish => {
                inner.complete = true;
                inner.running = false;
                debug!(typewriter = %self.label, "script complete");
                events.push(PlaybackEvent::Complete);
            }
            Step::Reveal { .. } => {
                inner.cursor = cursor::apply_step(&inner.script, &inner.timing, before, step);
                let text = inner.cursor.revealed_text(&inner.script).to_string();
                trace!(typewriter = %self.label, cursor = %inner.cursor, "reveal");
                metrics::record_reveal(&self.label);
                events.push(PlaybackEvent::Revealed {
                    cursor: inner.cursor,
                    text,
                });
            }
            Step::Advance { .. } => {
                inner.cursor = cursor::apply_step(&inner.script, &inner.timing, before, step);
                let text = inner.script.line(before.line_index).unwrap_or("").to_string();
                metrics::record_line_completed(&self.label);
                events.push(PlaybackEvent::LineCompleted {
                    line_index: before.line_index,
                    text,
                });
                if inner.timing.repeat && before.line_index + 1 >= inner.script.len() {
                    inner.cycle += 1;
                    debug!(typewriter = %self.label, cycle = inner.cycle, "script wrapped");
                    events.push(PlaybackEvent::Wrapped { cycle: inner.cycle });
                }
            }
        }

        let more = !inner.complete;
        self.publish(&inner, events);
        more
    }
}

/// Reveals one script over time.
///
/// Owns a single [`TimerSlot`]; dropping the typewriter stops it.
pub struct Typewriter {
    shared: Arc<Shared>,
    slot: TimerSlot,
}

impl Typewriter {
    /// Creates a stopped typewriter at the start of `script`.
    #[must_use]
    pub fn new(label: impl Into<String>, script: Script, timing: TypewriterTiming) -> Self {
        let inner = Inner {
            script,
            timing,
            cursor: PlaybackCursor::START,
            complete: false,
            running: false,
            cycle: 0,
        };
        let (snapshot, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                inner: Mutex::new(inner),
                snapshot,
                subscribers: Mutex::new(Vec::new()),
            }),
            slot: TimerSlot::new("typewriter"),
        }
    }

    /// Starts ticking, resuming from the current cursor.
    ///
    /// No-op while already running or after completion; call
    /// [`reset`](Self::reset) first to play again.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.complete || self.slot.is_armed() {
                return;
            }
            inner.running = true;
            debug!(typewriter = %self.shared.label, cursor = %inner.cursor, "typewriter started");
            self.shared.publish(&inner, Vec::new());
        }
        let shared = Arc::clone(&self.shared);
        self.slot.arm(move |cancel| run(shared, cancel));
    }

    /// Stops ticking. The cursor keeps its last value. Idempotent.
    pub fn stop(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        if inner.running {
            inner.running = false;
            debug!(typewriter = %self.shared.label, cursor = %inner.cursor, "typewriter stopped");
            self.shared.publish(&inner, Vec::new());
        }
    }

    /// Stops and returns the cursor to `{0, 0}`, clearing completion.
    ///
    /// Does not resume playback.
    pub fn reset(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        inner.cursor = PlaybackCursor::START;
        inner.complete = false;
        inner.running = false;
        inner.cycle = 0;
        debug!(typewriter = %self.shared.label, "typewriter reset");
        self.shared.publish(&inner, vec![PlaybackEvent::Reset]);
    }

    /// Reveals the whole script at once and completes.
    ///
    /// Used when motion is reduced: every line is emitted as revealed and
    /// completed without waiting.
    pub fn reveal_all(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        let mut events = Vec::new();
        for line_index in inner.cursor.line_index..inner.script.len() {
            let text = inner.script.line(line_index).unwrap_or("").to_string();
            let cursor = PlaybackCursor::new(line_index, inner.script.line_chars(line_index));
            if !text.is_empty() {
                events.push(PlaybackEvent::Revealed {
                    cursor,
                    text: text.clone(),
                });
            }
            events.push(PlaybackEvent::LineCompleted { line_index, text });
        }
        events.push(PlaybackEvent::Complete);
        inner.cursor = PlaybackCursor::new(inner.script.len(), 0);
        inner.complete = true;
        inner.running = false;
        self.shared.publish(&inner, events);
    }

    /// Current cursor.
    #[must_use]
    pub fn cursor(&self) -> PlaybackCursor {
        self.shared.lock().cursor
    }

    /// Revealed text of the current line.
    #[must_use]
    pub fn revealed_text(&self) -> String {
        let inner = self.shared.lock();
        inner.cursor.revealed_text(&inner.script).to_string()
    }

    /// Whether the script has been played through.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.lock().complete
    }

    /// Whether the timer is ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TypewriterSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver for the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TypewriterSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Subscribes to every event from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PlaybackEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Waits until the script has been played through.
    ///
    /// Never returns for a repeating typewriter.
    pub async fn completed(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|snapshot| snapshot.complete).await;
    }

    /// The script being played.
    #[must_use]
    pub fn script(&self) -> Script {
        self.shared.lock().script.clone()
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }
}

impl std::fmt::Debug for Typewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Typewriter")
            .field("label", &self.shared.label)
            .field("cursor", &inner.cursor)
            .field("running", &inner.running)
            .field("complete", &inner.complete)
            .finish_non_exhaustive()
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let step = {
            let inner = shared.lock();
            let step = cursor::next_step(&inner.script, &inner.timing, inner.cursor);
            // An empty repeating script would spin without ever waiting.
            if inner.timing.repeat && inner.script.is_empty() {
                Step::Finish
            } else {
                step
            }
        };

        let wait = step.wait();
        if !wait.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(wait) => {}
            }
        }
        if !shared.apply(step, &cancel) {
            return;
        }
        if wait.is_zero() {
            tokio::task::yield_now().await;
        }
    }
}
