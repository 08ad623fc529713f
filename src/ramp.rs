//! Synthetic progress bar.
//!
//! A [`ProgressRamp`] turns elapsed time into a loading percentage that
//! rushes to 40%, crawls to 70%, speeds up to 97%, sits there for a beat
//! and then finishes. The displayed value is floored and never goes back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::observability::metrics;
use crate::timer::TimerSlot;

/// Default total duration of a ramp.
pub const DEFAULT_TOTAL: Duration = Duration::from_secs(15);

/// Default update interval of a ramp.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Target progress (0–100) for a given elapsed/total ratio.
///
/// Piecewise linear: `[0, 0.2)` → 0..40, `[0.2, 0.6)` → 40..70,
/// `[0.6, 0.9)` → 70..97, `[0.9, 0.95)` → 97, `[0.95, 1.0]` → 97..100,
/// above 1 → 100. Negative ratios clamp to 0.
#[must_use]
pub fn target_progress(ratio: f64) -> f64 {
    if ratio.is_nan() || ratio <= 0.0 {
        0.0
    } else if ratio < 0.2 {
        (ratio / 0.2) * 40.0
    } else if ratio < 0.6 {
        40.0 + ((ratio - 0.2) / 0.4) * 30.0
    } else if ratio < 0.9 {
        70.0 + ((ratio - 0.6) / 0.3) * 27.0
    } else if ratio < 0.95 {
        97.0
    } else if ratio <= 1.0 {
        97.0 + ((ratio - 0.95) / 0.05) * 3.0
    } else {
        100.0
    }
}

/// Ramp parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampConfig {
    /// Time to go from 0 to 100
    pub total: Duration,
    /// Update interval
    pub tick: Duration,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL,
            tick: DEFAULT_TICK,
        }
    }
}

/// Pure ramp state: feed it elapsed time, read back the displayed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampState {
    total: Duration,
    progress: f64,
    displayed: u8,
}

impl RampState {
    /// Fresh state at 0%.
    #[must_use]
    pub const fn new(total: Duration) -> Self {
        Self {
            total,
            progress: 0.0,
            displayed: 0,
        }
    }

    /// Updates the state for `elapsed` and returns the displayed value.
    ///
    /// A lower instantaneous target (timer jitter, clock hiccup) leaves the
    /// value where it was.
    pub fn advance(&mut self, elapsed: Duration) -> u8 {
        let ratio = if self.total.is_zero() {
            f64::INFINITY
        } else {
            elapsed.as_secs_f64() / self.total.as_secs_f64()
        };
        let target = target_progress(ratio);
        if target > self.progress {
            self.progress = target.min(100.0);
        }
        // progress is clamped to [0, 100], so the cast cannot truncate
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let floored = self.progress.floor() as u8;
        self.displayed = self.displayed.max(floored);
        self.displayed
    }

    /// Displayed progress.
    #[must_use]
    pub const fn displayed(&self) -> u8 {
        self.displayed
    }

    /// Whether 100% has been reached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.displayed >= 100
    }
}

/// Ramp event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampEvent {
    /// Displayed value changed
    Progress(u8),
    /// 100% reached; sent exactly once per run
    Complete,
    /// Ramp returned to 0%
    Reset,
}

/// Latest observable ramp state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RampSnapshot {
    /// Displayed percentage
    pub progress: u8,
    /// Whether the ramp is ticking
    pub running: bool,
    /// Whether 100% was reached
    pub complete: bool,
}

struct Inner {
    state: RampState,
    /// Elapsed time accumulated before the current run segment
    banked: Duration,
    /// Start of the current run segment
    resumed_at: Option<Instant>,
}

impl Inner {
    fn elapsed(&self) -> Duration {
        self.banked + self.resumed_at.map_or(Duration::ZERO, |at| at.elapsed())
    }

    fn snapshot(&self) -> RampSnapshot {
        RampSnapshot {
            progress: self.state.displayed(),
            running: self.resumed_at.is_some(),
            complete: self.state.is_complete(),
        }
    }
}

struct Shared {
    label: String,
    config: RampConfig,
    inner: Mutex<Inner>,
    snapshot: watch::Sender<RampSnapshot>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RampEvent>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner, event: Option<RampEvent>) {
        self.snapshot.send_replace(inner.snapshot());
        if let Some(event) = event {
            self.subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| tx.send(event).is_ok());
        }
    }

    /// One tick. Returns `false` once the ramp is complete or the tick
    /// was cancelled.
    fn tick(&self, cancel: &CancellationToken) -> bool {
        let mut inner = self.lock();
        if cancel.is_cancelled() {
            return false;
        }
        let before = inner.state.displayed();
        let elapsed = inner.elapsed();
        let now = inner.state.advance(elapsed);
        if now != before {
            trace!(ramp = %self.label, progress = now, "progress");
            metrics::record_progress(&self.label, now);
            self.publish(&inner, Some(RampEvent::Progress(now)));
        }
        if inner.state.is_complete() {
            inner.banked = elapsed;
            inner.resumed_at = None;
            debug!(ramp = %self.label, ?elapsed, "ramp complete");
            self.publish(&inner, Some(RampEvent::Complete));
            return false;
        }
        true
    }
}

/// Time-driven progress value in `[0, 100]`.
pub struct ProgressRamp {
    shared: Arc<Shared>,
    slot: TimerSlot,
}

impl ProgressRamp {
    /// Creates a stopped ramp at 0%.
    #[must_use]
    pub fn new(label: impl Into<String>, config: RampConfig) -> Self {
        let inner = Inner {
            state: RampState::new(config.total),
            banked: Duration::ZERO,
            resumed_at: None,
        };
        let (snapshot, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                config,
                inner: Mutex::new(inner),
                snapshot,
                subscribers: Mutex::new(Vec::new()),
            }),
            slot: TimerSlot::new("ramp"),
        }
    }

    /// Starts (or resumes) ticking. No-op when running or complete.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.state.is_complete() || inner.resumed_at.is_some() {
                return;
            }
            inner.resumed_at = Some(Instant::now());
            debug!(ramp = %self.shared.label, total = ?self.shared.config.total, "ramp started");
            self.shared.publish(&inner, None);
        }
        let shared = Arc::clone(&self.shared);
        self.slot.arm(move |cancel| run(shared, cancel));
    }

    /// Stops ticking and keeps the elapsed time for a later resume.
    pub fn stop(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        if let Some(at) = inner.resumed_at.take() {
            inner.banked += at.elapsed();
            self.shared.publish(&inner, None);
        }
    }

    /// Stops and returns to 0%.
    pub fn reset(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        inner.state = RampState::new(self.shared.config.total);
        inner.banked = Duration::ZERO;
        inner.resumed_at = None;
        self.shared.publish(&inner, Some(RampEvent::Reset));
    }

    /// Displayed percentage.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.shared.lock().state.displayed()
    }

    /// Whether 100% was reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.lock().state.is_complete()
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RampSnapshot {
        *self.shared.snapshot.borrow()
    }

    /// Receiver for the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<RampSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Subscribes to every event from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RampEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Waits until 100% is reached.
    pub async fn completed(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|snapshot| snapshot.complete).await;
    }

    /// Ramp parameters.
    #[must_use]
    pub fn config(&self) -> RampConfig {
        self.shared.config
    }
}

impl std::fmt::Debug for ProgressRamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRamp")
            .field("label", &self.shared.label)
            .field("config", &self.shared.config)
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let tick = shared.config.tick.max(Duration::from_millis(1));
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(tick) => {}
        }
        if !shared.tick(&cancel) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_curve_boundaries() {
        assert!(approx(target_progress(0.0), 0.0));
        assert!(approx(target_progress(0.2), 40.0));
        assert!(approx(target_progress(0.6), 70.0));
        assert!(approx(target_progress(0.9), 97.0));
        assert!(approx(target_progress(0.95), 97.0));
        assert!(approx(target_progress(1.0), 100.0));
        assert!(approx(target_progress(3.0), 100.0));
    }

    #[test]
    fn test_curve_segments() {
        assert!(approx(target_progress(0.1), 20.0));
        assert!(approx(target_progress(0.4), 55.0));
        assert!(approx(target_progress(0.75), 83.5));
        assert!(approx(target_progress(0.92), 97.0));
        assert!(approx(target_progress(0.975), 98.5));
    }

    #[test]
    fn test_state_never_regresses() {
        let mut state = RampState::new(Duration::from_secs(10));
        assert_eq!(state.advance(Duration::from_secs(4)), 55);
        // Jitter: an earlier timestamp does not pull the bar back.
        assert_eq!(state.advance(Duration::from_secs(1)), 55);
        assert_eq!(state.advance(Duration::from_secs(11)), 100);
        assert!(state.is_complete());
    }

    #[test]
    fn test_zero_total_completes_at_once() {
        let mut state = RampState::new(Duration::ZERO);
        assert_eq!(state.advance(Duration::ZERO), 100);
    }

    proptest! {
        #[test]
        fn prop_displayed_is_monotonic_and_bounded(
            samples in proptest::collection::vec(0u64..30_000, 1..200)
        ) {
            let mut state = RampState::new(Duration::from_secs(15));
            let mut last = 0u8;
            for ms in samples {
                let shown = state.advance(Duration::from_millis(ms));
                prop_assert!(shown >= last);
                prop_assert!(shown <= 100);
                last = shown;
            }
        }

        #[test]
        fn prop_reaches_100_at_total(total_ms in 1u64..60_000, extra in 0u64..10_000) {
            let mut state = RampState::new(Duration::from_millis(total_ms));
            prop_assert_eq!(state.advance(Duration::from_millis(total_ms + extra)), 100);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_completes_once_after_total() {
        let ramp = ProgressRamp::new(
            "boot",
            RampConfig {
                total: Duration::from_secs(15),
                tick: Duration::from_millis(50),
            },
        );
        let mut rx = ramp.subscribe();
        let started = Instant::now();
        ramp.start();
        ramp.completed().await;
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(started.elapsed() < Duration::from_millis(15_100));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut last = 0;
        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                RampEvent::Progress(p) => {
                    assert!(p > last);
                    last = p;
                }
                RampEvent::Complete => completions += 1,
                RampEvent::Reset => panic!("unexpected reset"),
            }
        }
        assert_eq!(last, 100);
        assert_eq!(completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_pause_keeps_elapsed() {
        let ramp = ProgressRamp::new(
            "pause",
            RampConfig {
                total: Duration::from_secs(10),
                tick: Duration::from_millis(50),
            },
        );
        ramp.start();
        tokio::time::sleep(Duration::from_millis(1_010)).await;
        ramp.stop();
        let paused = ramp.progress();
        assert_eq!(paused, 20);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ramp.progress(), paused);

        ramp.start();
        tokio::time::sleep(Duration::from_millis(1_010)).await;
        assert_eq!(ramp.progress(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tick_is_ignored() {
        let ramp = ProgressRamp::new(
            "late",
            RampConfig {
                total: Duration::from_secs(10),
                tick: Duration::from_millis(50),
            },
        );
        let mut rx = ramp.subscribe();
        ramp.start();
        ramp.slot.disarm();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(!ramp.shared.tick(&cancelled));
        assert_eq!(ramp.progress(), 0);
        assert!(rx.try_recv().is_err());

        assert!(ramp.shared.tick(&CancellationToken::new()));
        assert!(ramp.progress() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_reset() {
        let ramp = ProgressRamp::new("reset", RampConfig::default());
        ramp.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(ramp.progress() > 0);
        ramp.reset();
        assert_eq!(ramp.progress(), 0);
        assert!(!ramp.snapshot().running);
    }
}
