//! Phase sequencer orchestration
//!
//! A [`Sequencer`] walks a fixed list of [`PhaseSpec`]s. Entering a phase
//! builds its typewriter or ramp, a driver task forwards their events
//! and waits for the exit trigger, and the transition tears the phase
//! down before the next one is entered. After the last descriptor the
//! sequencer sits in the terminal phase for good.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observability::metrics;
use crate::playback::{Playback, PlaybackEvent, Typewriter, TypewriterTiming};
use crate::ramp::{ProgressRamp, RampEvent};
use crate::timer::TimerSlot;

use super::phase::{PhaseAction, PhaseSpec, TERMINAL_PHASE};
use super::state::{PhaseTransition, SequencerEvent, SequencerStatus};
use super::trigger::ExitCondition;

type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Resources of the phase currently entered.
///
/// Dropping it stops the phase's typewriter and ramp.
struct ActivePhase {
    typewriter: Option<Arc<Typewriter>>,
    ramp: Option<Arc<ProgressRamp>>,
    /// Running time banked before the current resume
    waited: Duration,
    resumed_at: Option<Instant>,
}

impl ActivePhase {
    fn enter(sequencer: &str, spec: &PhaseSpec) -> Self {
        let label = format!("{sequencer}/{}", spec.name);
        let (typewriter, ramp) = match &spec.action {
            PhaseAction::Type { script, timing } => (
                Some(Arc::new(Typewriter::new(label, script.clone(), *timing))),
                None,
            ),
            PhaseAction::Show { script } => (
                Some(Arc::new(Typewriter::new(
                    label,
                    script.clone(),
                    TypewriterTiming::new(Duration::ZERO, Duration::ZERO),
                ))),
                None,
            ),
            PhaseAction::Wait => (None, None),
            PhaseAction::Ramp(config) => (None, Some(Arc::new(ProgressRamp::new(label, *config)))),
        };
        Self {
            typewriter,
            ramp,
            waited: Duration::ZERO,
            resumed_at: None,
        }
    }

    fn resume(&mut self, action: &PhaseAction) {
        if let Some(typewriter) = &self.typewriter {
            if matches!(action, PhaseAction::Show { .. }) {
                if !typewriter.is_complete() {
                    typewriter.reveal_all();
                }
            } else {
                typewriter.start();
            }
        }
        if let Some(ramp) = &self.ramp {
            ramp.start();
        }
        self.resumed_at.get_or_insert_with(Instant::now);
    }

    fn pause(&mut self) {
        if let Some(typewriter) = &self.typewriter {
            typewriter.stop();
        }
        if let Some(ramp) = &self.ramp {
            ramp.stop();
        }
        if let Some(at) = self.resumed_at.take() {
            self.waited += at.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.waited + self.resumed_at.map_or(Duration::ZERO, |at| at.elapsed())
    }
}

impl Drop for ActivePhase {
    fn drop(&mut self) {
        self.pause();
    }
}

struct Inner {
    phase_index: usize,
    active: Option<ActivePhase>,
    running: bool,
    terminal: bool,
    status: SequencerStatus,
}

struct Completion {
    callback: Option<CompletionCallback>,
    fired: bool,
}

struct Shared {
    label: String,
    phases: Arc<[PhaseSpec]>,
    inner: Mutex<Inner>,
    status: watch::Sender<SequencerStatus>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SequencerEvent>>>,
    completion: Mutex<Completion>,
}

/// What the driver waits on while a phase is active.
struct PhaseWait {
    index: usize,
    exit: ExitCondition,
    typewriter: Option<mpsc::UnboundedReceiver<PlaybackEvent>>,
    ramp: Option<mpsc::UnboundedReceiver<RampEvent>>,
    deadline: Option<Instant>,
    /// Exit already met before this resume
    satisfied: bool,
}

impl PhaseWait {
    /// Forwards resource events until the exit fires, returning the reason.
    async fn fired(&mut self, shared: &Shared) -> String {
        let index = self.index;
        let exit = self.exit;
        if self.satisfied {
            return exit.to_string();
        }
        let deadline = self.deadline;
        loop {
            tokio::select! {
                biased;
                Some(event) = next_event(&mut self.typewriter) => {
                    let done = event == PlaybackEvent::Complete;
                    shared.forward_typewriter(index, event);
                    if done && exit == ExitCondition::TypewriterComplete {
                        return exit.to_string();
                    }
                }
                Some(event) = next_event(&mut self.ramp) => {
                    let done = event == RampEvent::Complete;
                    shared.forward_ramp(index, event);
                    if done && exit == ExitCondition::RampComplete {
                        return exit.to_string();
                    }
                }
                () = sleep_until(deadline) => return exit.to_string(),
            }
        }
    }
}

async fn next_event<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase_name(&self, index: usize) -> &str {
        self.phases
            .get(index)
            .map_or(TERMINAL_PHASE, |phase| phase.name.as_str())
    }

    fn publish(&self, inner: &Inner, events: Vec<SequencerEvent>) {
        self.status.send_replace(inner.status.clone());
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

    /// Runs the completion callback unless it already ran.
    fn fire_completion(&self) {
        let callback = {
            let mut completion = self
                .completion
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if completion.fired {
                return;
            }
            completion.fired = true;
            completion.callback.take()
        };
        info!(sequencer = %self.label, "sequence complete");
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Marks the sequencer running. Returns `false` when there is nothing
    /// to drive.
    fn begin(&self) -> bool {
        let mut inner = self.lock();
        if inner.terminal {
            drop(inner);
            self.fire_completion();
            return false;
        }
        if inner.running {
            return false;
        }
        inner.running = true;
        inner.status.running = true;
        debug!(sequencer = %self.label, phase = %self.phase_name(inner.phase_index), "sequencer started");
        self.publish(&inner, Vec::new());
        true
    }

    fn pause(&self) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        inner.running = false;
        if let Some(active) = inner.active.as_mut() {
            active.pause();
        }
        inner.status.running = false;
        debug!(sequencer = %self.label, phase = %self.phase_name(inner.phase_index), "sequencer paused");
        self.publish(&inner, Vec::new());
    }

    /// Enters the current phase if needed and resumes its resources.
    fn resume_active(&self) -> Option<PhaseWait> {
        let mut inner = self.lock();
        if inner.terminal || !inner.running {
            return None;
        }
        let index = inner.phase_index;
        let spec = self.phases.get(index)?;
        let mut events = Vec::new();

        if inner.active.is_none() {
            info!(
                sequencer = %self.label,
                phase = %spec.name,
                action = spec.action.kind(),
                exit = %spec.exit,
                "phase entered"
            );
            if !spec.exit.can_fire_for(&spec.action) {
                warn!(sequencer = %self.label, phase = %spec.name, exit = %spec.exit, "exit can never fire; sequencer will stall");
            }
            inner.active = Some(ActivePhase::enter(&self.label, spec));
            events.push(SequencerEvent::PhaseEntered {
                index,
                phase: spec.name.clone(),
            });
        }

        let active = inner.active.as_mut()?;
        let typewriter = active.typewriter.as_ref().map(|tw| tw.subscribe());
        let ramp = active.ramp.as_ref().map(|ramp| ramp.subscribe());
        let satisfied = match spec.exit {
            ExitCondition::TypewriterComplete => {
                active.typewriter.as_ref().is_some_and(|tw| tw.is_complete())
            }
            ExitCondition::RampComplete => active.ramp.as_ref().is_some_and(|ramp| ramp.is_complete()),
            ExitCondition::After(_) | ExitCondition::Signal => false,
        };
        let deadline = match spec.exit {
            // A deadline past the end of the clock never arrives.
            ExitCondition::After(limit) => {
                Instant::now().checked_add(limit.saturating_sub(active.elapsed()))
            }
            _ => None,
        };
        active.resume(&spec.action);

        let snapshot = active.typewriter.as_ref().map(|tw| tw.snapshot());
        let progress = active.ramp.as_ref().map(|ramp| ramp.progress());
        if let Some(snapshot) = snapshot {
            inner.status.cursor = snapshot.cursor;
            inner.status.text = snapshot.text;
        }
        inner.status.progress = progress;
        self.publish(&inner, events);

        Some(PhaseWait {
            index,
            exit: spec.exit,
            typewriter,
            ramp,
            deadline,
            satisfied,
        })
    }

    fn forward_typewriter(&self, index: usize, event: PlaybackEvent) {
        let mut inner = self.lock();
        if inner.terminal || inner.phase_index != index {
            return;
        }
        let snapshot = inner
            .active
            .as_ref()
            .and_then(|active| active.typewriter.as_ref())
            .map(|tw| tw.snapshot());
        if let Some(snapshot) = snapshot {
            inner.status.cursor = snapshot.cursor;
            inner.status.text = snapshot.text;
        }
        self.publish(&inner, vec![SequencerEvent::Typewriter { index, event }]);
    }

    fn forward_ramp(&self, index: usize, event: RampEvent) {
        let mut inner = self.lock();
        if inner.terminal || inner.phase_index != index {
            return;
        }
        if let RampEvent::Progress(value) = event {
            inner.status.progress = Some(value);
        }
        self.publish(&inner, vec![SequencerEvent::Ramp { index, event }]);
    }

    /// Leaves phase `from`. Returns `true` while there are phases left to
    /// drive.
    fn advance(&self, from: usize, reason: &str) -> bool {
        let mut inner = self.lock();
        if inner.terminal || inner.phase_index != from {
            return false;
        }
        let to = from + 1;
        let from_phase = self.phase_name(from).to_string();
        let to_phase = self.phase_name(to).to_string();
        info!(sequencer = %self.label, from = %from_phase, to = %to_phase, reason, "phase transition");
        metrics::record_phase_transition(&self.label, &to_phase);

        inner.active = None;
        inner.phase_index = to;
        let terminal = to >= self.phases.len();
        let mut events = vec![SequencerEvent::Transition(PhaseTransition {
            from,
            to,
            from_phase,
            to_phase: to_phase.clone(),
            reason: reason.to_string(),
        })];
        if terminal {
            inner.terminal = true;
            inner.running = false;
            inner.status = SequencerStatus::terminal(to);
            events.push(SequencerEvent::Complete);
        } else {
            inner.status = SequencerStatus::at(to, &to_phase, false);
            inner.status.running = inner.running;
        }
        self.publish(&inner, events);
        drop(inner);

        if terminal {
            self.fire_completion();
        }
        !terminal
    }
}

/// Driver task: runs phases until the terminal phase or cancellation.
async fn drive(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let Some(mut wait) = shared.resume_active() else {
            return;
        };
        let reason = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            reason = wait.fired(&shared) => reason,
        };
        let index = wait.index;
        drop(wait);
        if cancel.is_cancelled() || !shared.advance(index, &reason) {
            return;
        }
    }
}

/// Linear phase state machine.
///
/// Exactly one phase is active at a time and transitions only go forward.
/// The completion callback runs at most once for the lifetime of the
/// sequencer, whatever resets or restarts happen. Dropping the sequencer
/// stops every timer it owns.
pub struct Sequencer {
    shared: Arc<Shared>,
    slot: TimerSlot,
}

impl Sequencer {
    /// Creates a stopped sequencer at its first phase.
    ///
    /// With no phases the sequencer starts out terminal.
    #[must_use]
    pub fn new(label: impl Into<String>, phases: Vec<PhaseSpec>) -> Self {
        let phases: Arc<[PhaseSpec]> = phases.into();
        let terminal = phases.is_empty();
        let status = if terminal {
            SequencerStatus::terminal(0)
        } else {
            SequencerStatus::at(0, &phases[0].name, false)
        };
        let (sender, _) = watch::channel(status.clone());
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                phases,
                inner: Mutex::new(Inner {
                    phase_index: 0,
                    active: None,
                    running: false,
                    terminal,
                    status,
                }),
                status: sender,
                subscribers: Mutex::new(Vec::new()),
                completion: Mutex::new(Completion {
                    callback: None,
                    fired: false,
                }),
            }),
            slot: TimerSlot::new("sequencer"),
        }
    }

    /// When `already` is set, the sequencer starts out terminal: no phase
    /// plays and [`start`](Self::start) only runs the completion callback.
    #[must_use]
    pub fn with_already_completed(self, already: bool) -> Self {
        if already {
            let mut inner = self.shared.lock();
            inner.phase_index = self.shared.phases.len();
            inner.terminal = true;
            inner.status = SequencerStatus::terminal(inner.phase_index);
            self.shared.publish(&inner, Vec::new());
        }
        self
    }

    /// Registers the completion callback, replacing a previous one.
    ///
    /// Ignored once the callback slot has fired.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut completion = self
            .shared
            .completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !completion.fired {
            completion.callback = Some(Box::new(callback));
        }
    }

    /// Starts or resumes the active phase.
    ///
    /// On a terminal sequencer this only runs the completion callback (if
    /// it has not run yet). Cancels a pending [`start_after`](Self::start_after).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        if self.shared.begin() {
            let shared = Arc::clone(&self.shared);
            self.slot.arm(move |cancel| drive(shared, cancel));
        }
    }

    /// Starts once `upstream` reaches its terminal phase.
    ///
    /// Starts right away when `upstream` is already terminal. The wait is
    /// abandoned if `upstream` is dropped first. No-op while running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_after(&self, upstream: &Self) {
        if self.is_running() {
            return;
        }
        let mut upstream_status = upstream.watch();
        let shared = Arc::clone(&self.shared);
        debug!(sequencer = %self.shared.label, upstream = %upstream.label(), "waiting for upstream");
        self.slot.arm(move |cancel| async move {
            let ready = async move {
                upstream_status
                    .wait_for(|status| status.terminal)
                    .await
                    .is_ok()
            };
            let ready = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                ready = ready => ready,
            };
            if !ready || cancel.is_cancelled() || !shared.begin() {
                return;
            }
            drive(shared, cancel).await;
        });
    }

    /// Pauses the active phase, keeping its typewriter cursor, ramp time
    /// and wait time. Also cancels a pending `start_after`.
    pub fn stop(&self) {
        self.slot.disarm();
        self.shared.pause();
    }

    /// Stops and rewinds to the first phase.
    ///
    /// A completion callback that already ran is not re-armed.
    pub fn reset(&self) {
        self.slot.disarm();
        let mut inner = self.shared.lock();
        inner.active = None;
        inner.phase_index = 0;
        inner.running = false;
        inner.terminal = self.shared.phases.is_empty();
        inner.status = if inner.terminal {
            SequencerStatus::terminal(0)
        } else {
            SequencerStatus::at(0, self.shared.phase_name(0), false)
        };
        debug!(sequencer = %self.shared.label, "sequencer reset");
        self.shared.publish(&inner, vec![SequencerEvent::Reset]);
    }

    /// Fires a [`ExitCondition::Signal`] exit.
    ///
    /// Returns `false` when the active phase does not wait for a signal
    /// (or has not been entered yet).
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn signal(&self) -> bool {
        let index = {
            let inner = self.shared.lock();
            if inner.terminal || inner.active.is_none() {
                return false;
            }
            let index = inner.phase_index;
            if self.shared.phases[index].exit != ExitCondition::Signal {
                return false;
            }
            index
        };
        self.slot.disarm();
        let more = self.shared.advance(index, "signal");
        if more && self.shared.lock().running {
            let shared = Arc::clone(&self.shared);
            self.slot.arm(move |cancel| drive(shared, cancel));
        }
        true
    }

    /// Index of the current phase; the phase count once terminal.
    #[must_use]
    pub fn phase_index(&self) -> usize {
        self.shared.lock().phase_index
    }

    /// Name of the current phase.
    #[must_use]
    pub fn current_phase(&self) -> String {
        let index = self.phase_index();
        self.shared.phase_name(index).to_string()
    }

    /// Whether the terminal phase was reached.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.shared.lock().terminal
    }

    /// Whether the sequencer is playing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Latest status.
    #[must_use]
    pub fn status(&self) -> SequencerStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver for the latest status.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SequencerStatus> {
        self.shared.status.subscribe()
    }

    /// Subscribes to every event from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SequencerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Waits until the terminal phase is reached.
    pub async fn completed(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|status| status.terminal).await;
    }

    /// Phase descriptors.
    #[must_use]
    pub fn phases(&self) -> &[PhaseSpec] {
        &self.shared.phases
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }
}

impl Playback for Sequencer {
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

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.slot.disarm();
        self.shared.lock().active = None;
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("label", &self.shared.label)
            .field("phases", &self.shared.phases.len())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::playback::PlaybackCursor;
    use crate::ramp::RampConfig;
    use crate::script::Script;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SequencerEvent>) -> Vec<SequencerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn transitions(events: &[SequencerEvent]) -> Vec<(String, String)> {
        events
            .iter()
            .filter_map(|event| match event {
                SequencerEvent::Transition(t) => Some((t.from_phase.clone(), t.to_phase.clone())),
                _ => None,
            })
            .collect()
    }

    fn counter(sequencer: &Sequencer) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&count);
        sequencer.on_complete(move || {
            hook.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    fn boot_like() -> Vec<PhaseSpec> {
        vec![
            PhaseSpec::showing("init", Script::new(["booting"]), ms(300)),
            PhaseSpec::typing(
                "type",
                Script::new(["ab"]),
                TypewriterTiming::new(ms(10), ms(100)),
            ),
            PhaseSpec::waiting("hold", ms(200)),
            PhaseSpec::ramping(
                "ramp",
                RampConfig {
                    total: ms(1_000),
                    tick: ms(50),
                },
            ),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_chained_scripts_never_interleave() {
        let timing = TypewriterTiming::new(ms(30), ms(800));
        let sequencer = Sequencer::new(
            "chain",
            vec![
                PhaseSpec::typing("first", Script::new(["[OK] boot", ""]), timing),
                PhaseSpec::typing("second", Script::new(["$ next"]), timing),
            ],
        );
        let mut events = sequencer.subscribe();
        sequencer.start();
        sequencer.completed().await;

        let events = drain(&mut events);
        let handoff = events
            .iter()
            .position(|event| matches!(event, SequencerEvent::Transition(t) if t.from == 0))
            .unwrap();
        for (position, event) in events.iter().enumerate() {
            match event {
                SequencerEvent::Typewriter { index: 0, .. } => assert!(position < handoff),
                SequencerEvent::Typewriter { index: 1, .. } => assert!(position > handoff),
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_run_in_order_and_complete_once() {
        let sequencer = Sequencer::new("boot", boot_like());
        let fired = counter(&sequencer);
        let mut events = sequencer.subscribe();

        let started = Instant::now();
        sequencer.start();
        sequencer.completed().await;
        let elapsed = started.elapsed();

        assert!(
            elapsed >= ms(1_600) && elapsed < ms(1_700),
            "took {elapsed:?}"
        );
        assert!(sequencer.is_terminal());
        assert_eq!(sequencer.current_phase(), TERMINAL_PHASE);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let events = drain(&mut events);
        assert_eq!(
            transitions(&events),
            vec![
                ("init".into(), "type".into()),
                ("type".into(), "hold".into()),
                ("hold".into(), "ramp".into()),
                ("ramp".into(), "complete".into()),
            ]
        );
        assert_eq!(events.last(), Some(&SequencerEvent::Complete));
        let revealed: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                SequencerEvent::Typewriter {
                    index: 1,
                    event: PlaybackEvent::Revealed { text, .. },
                } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(revealed, vec!["a", "ab"]);
        assert!(events.contains(&SequencerEvent::Ramp {
            index: 3,
            event: RampEvent::Progress(100)
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_never_fires_twice() {
        let sequencer = Sequencer::new("once", vec![PhaseSpec::waiting("hold", ms(10))]);
        let fired = counter(&sequencer);

        sequencer.start();
        sequencer.completed().await;
        sequencer.reset();
        assert!(!sequencer.is_terminal());
        sequencer.start();
        sequencer.completed().await;
        sequencer.start();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_wait_time() {
        let sequencer = Sequencer::new("pause", vec![PhaseSpec::waiting("hold", ms(1_000))]);
        sequencer.start();
        tokio::time::sleep(ms(400)).await;
        sequencer.stop();
        tokio::time::sleep(ms(5_000)).await;
        assert_eq!(sequencer.current_phase(), "hold");
        assert!(!sequencer.is_running());

        sequencer.start();
        tokio::time::sleep(ms(590)).await;
        assert!(!sequencer.is_terminal());
        tokio::time::sleep(ms(20)).await;
        assert!(sequencer.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_typewriter_cursor() {
        let sequencer = Sequencer::new(
            "cursor",
            vec![PhaseSpec::typing(
                "type",
                Script::new(["abcdefghij"]),
                TypewriterTiming::new(ms(10), ms(100)),
            )],
        );
        sequencer.start();
        tokio::time::sleep(ms(35)).await;
        sequencer.stop();
        assert_eq!(sequencer.status().cursor, PlaybackCursor::new(0, 3));

        tokio::time::sleep(ms(1_000)).await;
        assert_eq!(sequencer.status().cursor, PlaybackCursor::new(0, 3));

        sequencer.start();
        tokio::time::sleep(ms(25)).await;
        assert_eq!(sequencer.status().cursor, PlaybackCursor::new(0, 5));
        assert_eq!(sequencer.status().text, "abcde");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_waits_for_upstream() {
        let upstream = Sequencer::new(
            "kernel",
            vec![PhaseSpec::typing(
                "logs",
                Script::new(["ab"]),
                TypewriterTiming::new(ms(10), ms(50)),
            )],
        );
        let downstream = Sequencer::new(
            "commands",
            vec![PhaseSpec::typing(
                "prompt",
                Script::new(["cd"]),
                TypewriterTiming::new(ms(10), ms(50)),
            )],
        );
        let mut downstream_events = downstream.subscribe();

        downstream.start_after(&upstream);
        upstream.start();
        tokio::time::sleep(ms(60)).await;
        assert!(!downstream.is_running());
        assert!(drain(&mut downstream_events).is_empty());

        tokio::time::sleep(ms(200)).await;
        assert!(upstream.is_terminal());
        assert!(downstream.is_terminal());
        assert!(matches!(
            drain(&mut downstream_events).first(),
            Some(SequencerEvent::PhaseEntered { index: 0, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_terminal_upstream_starts_now() {
        let upstream = Sequencer::new("done", Vec::new());
        let downstream = Sequencer::new("next", vec![PhaseSpec::waiting("hold", ms(10))]);
        downstream.start_after(&upstream);
        tokio::time::sleep(ms(1)).await;
        assert!(downstream.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_completed_skips_phases() {
        let sequencer = Sequencer::new("boot", boot_like()).with_already_completed(true);
        let fired = counter(&sequencer);
        let mut events = sequencer.subscribe();

        assert!(sequencer.is_terminal());
        sequencer.start();
        sequencer.start();
        tokio::time::sleep(ms(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(drain(&mut events).is_empty());
        assert_eq!(sequencer.current_phase(), TERMINAL_PHASE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_sequencer_is_terminal() {
        let sequencer = Sequencer::new("empty", Vec::new());
        let fired = counter(&sequencer);
        assert!(sequencer.is_terminal());
        sequencer.start();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_exit() {
        let sequencer = Sequencer::new(
            "signal",
            vec![
                PhaseSpec::new("await", PhaseAction::Wait, ExitCondition::Signal),
                PhaseSpec::waiting("tail", ms(10)),
            ],
        );
        assert!(!sequencer.signal(), "phase not entered yet");
        sequencer.start();
        tokio::time::sleep(ms(5_000)).await;
        assert_eq!(sequencer.current_phase(), "await");

        assert!(sequencer.signal());
        assert_eq!(sequencer.current_phase(), "tail");
        assert!(!sequencer.signal());
        tokio::time::sleep(ms(20)).await;
        assert!(sequencer.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_exit_stalls() {
        let sequencer = Sequencer::new(
            "stall",
            vec![PhaseSpec::new(
                "idle",
                PhaseAction::Wait,
                ExitCondition::TypewriterComplete,
            )],
        );
        sequencer.start();
        tokio::time::sleep(ms(60_000)).await;
        assert_eq!(sequencer.current_phase(), "idle");
        assert!(sequencer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_beyond_clock_range_never_exits() {
        let sequencer = Sequencer::new(
            "forever",
            vec![
                PhaseSpec::waiting("hold", Duration::MAX),
                PhaseSpec::waiting("tail", ms(10)),
            ],
        );
        sequencer.start();
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        assert_eq!(sequencer.current_phase(), "hold");
        assert!(sequencer.is_running());

        sequencer.stop();
        sequencer.start();
        tokio::time::sleep(Duration::from_secs(86_400)).await;
        assert_eq!(sequencer.current_phase(), "hold");
        assert!(!sequencer.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_phase_resources() {
        let sequencer = Sequencer::new(
            "drop",
            vec![PhaseSpec::typing(
                "type",
                Script::new(["abcdefghij"]),
                TypewriterTiming::new(ms(10), ms(100)),
            )],
        );
        let mut status = sequencer.watch();
        sequencer.start();
        tokio::time::sleep(ms(25)).await;
        drop(sequencer);
        let _ = status.borrow_and_update();
        tokio::time::sleep(ms(1_000)).await;
        assert!(status.has_changed().is_err());
    }
}
