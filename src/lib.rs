//! `textplay` - sequenced terminal text playback
//!
//! Typewriter scripts, phase sequencing, progress ramps and visibility
//! gating, composed into named surfaces that play in a terminal.

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod observability;
pub mod playback;
pub mod presets;
pub mod ramp;
pub mod render;
pub mod script;
pub mod sequencer;
pub mod state;
pub mod surface;
pub mod timer;
