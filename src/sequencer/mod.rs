//! Phase sequencer
//!
//! Chains typewriters, waits and ramps into one linear state machine.
//!
//! # Architecture
//!
//! - [`PhaseSpec`]: named stage: entry action plus exit trigger
//! - [`ExitCondition`]: what ends a phase ([`trigger`])
//! - [`Sequencer`]: driver, transitions, pause/resume, completion callback
//! - [`SequencerStatus`] / [`SequencerEvent`]: what observers see

pub mod engine;
pub mod phase;
pub mod state;
pub mod trigger;

pub use engine::Sequencer;
pub use phase::{PhaseAction, PhaseSpec, TERMINAL_PHASE};
pub use state::{PhaseTransition, SequencerEvent, SequencerStatus};
pub use trigger::{ExitCondition, parse_duration};
