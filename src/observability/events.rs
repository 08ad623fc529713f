//! Structured event stream.
//!
//! Discrete, typed events emitted during a run. Events are serialized as
//! newline-delimited JSON (JSONL) and carry a monotonically increasing
//! sequence number and the run's id.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::playback::PlaybackEvent;
use crate::ramp::RampEvent;
use crate::sequencer::SequencerEvent;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every stream reached its terminal phase.
    Completed,
    /// The visibility timeline ended with the surface hidden.
    Hidden,
    /// Interrupted by SIGINT.
    Interrupted,
    /// Terminated by SIGTERM.
    Terminated,
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a run.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Playback was set up.
    RunStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Surface name.
        surface: String,
        /// Stream names in declaration order.
        streams: Vec<String>,
        /// Whether motion was disabled.
        reduced_motion: bool,
    },

    /// A stream entered a phase.
    PhaseEntered {
        /// When the phase was entered.
        timestamp: DateTime<Utc>,
        /// Stream name.
        stream: String,
        /// Phase name.
        phase: String,
        /// Zero-based index of the phase.
        phase_index: usize,
    },

    /// A typewriter finished a line.
    LineCompleted {
        /// When the line finished.
        timestamp: DateTime<Utc>,
        /// Stream name.
        stream: String,
        /// Zero-based line index within the phase's script.
        line_index: usize,
        /// Full line text.
        text: String,
    },

    /// A ramp's displayed value changed.
    ProgressUpdated {
        /// When the value changed.
        timestamp: DateTime<Utc>,
        /// Stream name.
        stream: String,
        /// Displayed percentage.
        percent: u8,
    },

    /// The surface became visible or hidden.
    VisibilityChanged {
        /// When visibility changed.
        timestamp: DateTime<Utc>,
        /// New visibility.
        visible: bool,
    },

    /// The run ended.
    RunCompleted {
        /// When the run ended.
        timestamp: DateTime<Utc>,
        /// Surface name.
        surface: String,
        /// Why the run ended.
        reason: StopReason,
        /// Wall-clock run time in milliseconds.
        duration_ms: u64,
    },
}

impl Event {
    /// Maps a sequencer event to the structured event it reports, if any.
    ///
    /// Per-character reveals are too chatty for the event stream and are
    /// left to metrics.
    #[must_use]
    pub fn from_sequencer(stream: &str, event: &SequencerEvent) -> Option<Self> {
        let timestamp = Utc::now();
        match event {
            SequencerEvent::PhaseEntered { index, phase } => Some(Self::PhaseEntered {
                timestamp,
                stream: stream.to_owned(),
                phase: phase.clone(),
                phase_index: *index,
            }),
            SequencerEvent::Typewriter {
                event: PlaybackEvent::LineCompleted { line_index, text },
                ..
            } => Some(Self::LineCompleted {
                timestamp,
                stream: stream.to_owned(),
                line_index: *line_index,
                text: text.clone(),
            }),
            SequencerEvent::Ramp {
                event: RampEvent::Progress(percent),
                ..
            } => Some(Self::ProgressUpdated {
                timestamp,
                stream: stream.to_owned(),
                percent: *percent,
            }),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number and run id via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    run_id: Uuid,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped; a broken
/// event sink never stops playback.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
    run_id: Uuid,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("run_id", &self.run_id)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
            run_id: Uuid::new_v4(),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            run_id: self.run_id,
            event,
        };

        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Id shared by every event of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
