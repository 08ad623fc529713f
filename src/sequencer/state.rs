//! Observable sequencer state and events.

use serde::Serialize;

use crate::playback::{PlaybackCursor, PlaybackEvent};
use crate::ramp::RampEvent;

use super::phase::TERMINAL_PHASE;

/// Record of one phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    /// Index of the phase left
    pub from: usize,
    /// Index of the phase entered; equal to the phase count for the
    /// terminal phase
    pub to: usize,
    /// Name of the phase left
    pub from_phase: String,
    /// Name of the phase entered
    pub to_phase: String,
    /// Human-readable trigger that fired
    pub reason: String,
}

/// Everything a sequencer reports, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    /// A phase was entered and its action started
    PhaseEntered {
        /// Phase index
        index: usize,
        /// Phase name
        phase: String,
    },
    /// Event from the active phase's typewriter
    Typewriter {
        /// Phase index
        index: usize,
        /// Forwarded event
        event: PlaybackEvent,
    },
    /// Event from the active phase's ramp
    Ramp {
        /// Phase index
        index: usize,
        /// Forwarded event
        event: RampEvent,
    },
    /// The active phase's exit fired
    Transition(PhaseTransition),
    /// The terminal phase was reached
    Complete,
    /// The sequencer was rewound to its first phase
    Reset,
}

/// Latest observable sequencer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequencerStatus {
    /// Index of the current phase
    pub phase_index: usize,
    /// Name of the current phase
    pub phase: String,
    /// Cursor of the current phase's typewriter
    pub cursor: PlaybackCursor,
    /// Revealed text of the typewriter's current line
    pub text: String,
    /// Value of the current phase's ramp
    pub progress: Option<u8>,
    /// Whether the sequencer is playing
    pub running: bool,
    /// Whether the terminal phase was reached
    pub terminal: bool,
}

impl SequencerStatus {
    pub(crate) fn at(phase_index: usize, phase: &str, terminal: bool) -> Self {
        Self {
            phase_index,
            phase: phase.to_string(),
            cursor: PlaybackCursor::START,
            text: String::new(),
            progress: None,
            running: false,
            terminal,
        }
    }

    pub(crate) fn terminal(phase_index: usize) -> Self {
        Self::at(phase_index, TERMINAL_PHASE, true)
    }
}
