//! Typewriter playback
//!
//! - [`PlaybackCursor`] / [`next_step`]: pure stepping rules
//! - [`Typewriter`]: the timer-driven reveal of one script
//! - [`Playback`]: start/stop/reset seam shared by everything a
//!   [`crate::gate::VisibilityGate`] can drive

pub mod cursor;
pub mod typewriter;

pub use cursor::{PlaybackCursor, RevealUnit, Step, TypewriterTiming, apply_step, next_step};
pub use typewriter::{PlaybackEvent, Typewriter, TypewriterSnapshot};

use crate::ramp::ProgressRamp;

/// Something that can be started, paused and rewound.
pub trait Playback: Send + Sync {
    /// Starts or resumes playback.
    fn start(&self);
    /// Pauses playback, keeping its position.
    fn stop(&self);
    /// Rewinds to the beginning without resuming.
    fn reset(&self);
}

impl Playback for Typewriter {
    fn start(&self) {
        Self::start(self);
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn reset(&self) {
        Self::reset(self);
    }
}

impl Playback for ProgressRamp {
    fn start(&self) {
        Self::start(self);
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn reset(&self) {
        Self::reset(self);
    }
}
