//! Surfaces
//!
//! A surface is one on-screen element (boot screen, kernel panel, contact
//! terminal): one or more sequencer streams, an optional visibility gate,
//! and the [`Transcript`] a renderer draws from. A stream may name an
//! earlier stream as its upstream; it then begins only once that stream
//! is terminal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::gate::{GatePolicy, VisibilityGate};
use crate::observability::metrics;
use crate::playback::{Playback, PlaybackEvent};
use crate::ramp::RampEvent;
use crate::sequencer::{PhaseSpec, Sequencer, SequencerEvent};

/// One stream of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    /// Stream name, unique within the surface
    pub name: String,
    /// Earlier stream that must finish first
    pub after: Option<String>,
    /// Phases played by the stream
    pub phases: Vec<PhaseSpec>,
}

impl StreamSpec {
    /// Ungated stream.
    #[must_use]
    pub fn new(name: impl Into<String>, phases: Vec<PhaseSpec>) -> Self {
        Self {
            name: name.into(),
            after: None,
            phases,
        }
    }

    /// Gates this stream on `upstream`.
    #[must_use]
    pub fn after(mut self, upstream: impl Into<String>) -> Self {
        self.after = Some(upstream.into());
        self
    }
}

/// Declarative description of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    /// Surface name
    pub name: String,
    /// Visibility policy; `None` plays as soon as started
    pub gate: Option<GatePolicy>,
    /// Streams in declaration order
    pub streams: Vec<StreamSpec>,
}

impl SurfaceSpec {
    /// Time until every stream is terminal when played without pauses.
    ///
    /// `None` when any stream waits on a signal or never ends.
    #[must_use]
    pub fn nominal_duration(&self) -> Option<Duration> {
        let mut ends: IndexMap<&str, Duration> = IndexMap::new();
        for stream in &self.streams {
            let start = match &stream.after {
                Some(upstream) => ends.get(upstream.as_str()).copied().unwrap_or_default(),
                None => Duration::ZERO,
            };
            let length = stream
                .phases
                .iter()
                .map(PhaseSpec::nominal_duration)
                .sum::<Option<Duration>>()?;
            ends.insert(&stream.name, start + length);
        }
        Some(ends.values().copied().max().unwrap_or_default())
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Replace typing with instant reveals
    pub reduced_motion: bool,
    /// Skip straight to the terminal phase (boot flag already set)
    pub already_completed: bool,
}

struct Stream {
    sequencer: Sequencer,
    upstream: Option<usize>,
}

/// The streams of a surface, driven together.
pub struct Streams {
    entries: IndexMap<String, Stream>,
}

impl Streams {
    /// Streams by name, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sequencer)> {
        self.entries
            .iter()
            .map(|(name, stream)| (name.as_str(), &stream.sequencer))
    }

    /// Whether every stream reached its terminal phase.
    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.entries
            .values()
            .all(|stream| stream.sequencer.is_terminal())
    }
}

impl Playback for Streams {
    fn start(&self) {
        for stream in self.entries.values() {
            match stream
                .upstream
                .and_then(|index| self.entries.get_index(index))
            {
                Some((_, upstream)) => stream.sequencer.start_after(&upstream.sequencer),
                None => stream.sequencer.start(),
            }
        }
    }

    fn stop(&self) {
        for stream in self.entries.values() {
            stream.sequencer.stop();
        }
    }

    fn reset(&self) {
        for stream in self.entries.values() {
            stream.sequencer.reset();
        }
    }
}

type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

struct SurfaceCompletion {
    name: String,
    remaining: AtomicUsize,
    callback: Mutex<Option<CompletionCallback>>,
}

impl SurfaceCompletion {
    fn stream_done(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        info!(surface = %self.name, "surface complete");
        metrics::record_run_completed(&self.name);
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// A running surface.
///
/// Dropping it cancels every timer of every stream.
pub struct Surface {
    name: String,
    streams: Arc<Streams>,
    gate: Option<VisibilityGate<Streams>>,
    completion: Arc<SurfaceCompletion>,
}

impl Surface {
    /// Builds the surface's sequencers. Nothing plays until
    /// [`start`](Self::start) or a visibility change.
    ///
    /// An `after` that doesn't name an earlier stream is ignored with a
    /// warning; config validation rejects it before this point.
    #[must_use]
    pub fn new(spec: SurfaceSpec, options: SurfaceOptions) -> Self {
        let completion = Arc::new(SurfaceCompletion {
            name: spec.name.clone(),
            remaining: AtomicUsize::new(spec.streams.len()),
            callback: Mutex::new(None),
        });

        let mut entries: IndexMap<String, Stream> = IndexMap::with_capacity(spec.streams.len());
        for stream in spec.streams {
            let upstream = stream.after.as_deref().and_then(|after| {
                let index = entries.get_index_of(after);
                if index.is_none() {
                    warn!(surface = %spec.name, stream = %stream.name, after, "upstream is not an earlier stream; ignoring");
                }
                index
            });
            let phases = if options.reduced_motion {
                stream
                    .phases
                    .into_iter()
                    .map(PhaseSpec::without_motion)
                    .collect()
            } else {
                stream.phases
            };
            let sequencer = Sequencer::new(format!("{}/{}", spec.name, stream.name), phases)
                .with_already_completed(options.already_completed);
            let hook = Arc::clone(&completion);
            sequencer.on_complete(move || hook.stream_done());
            entries.insert(
                stream.name,
                Stream {
                    sequencer,
                    upstream,
                },
            );
        }
        if entries.is_empty() {
            completion.remaining.store(1, Ordering::SeqCst);
        }

        let streams = Arc::new(Streams { entries });
        let gate = spec
            .gate
            .map(|policy| VisibilityGate::new(Arc::clone(&streams), policy));
        debug!(
            surface = %spec.name,
            streams = streams.entries.len(),
            gated = gate.is_some(),
            reduced_motion = options.reduced_motion,
            already_completed = options.already_completed,
            "surface built"
        );

        Self {
            name: spec.name,
            streams,
            gate,
            completion,
        }
    }

    /// Registers the callback run once every stream is terminal.
    ///
    /// Must be registered before the surface can complete.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self
            .completion
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Starts every stream, bypassing the gate.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        if self.streams.entries.is_empty() {
            self.completion.stream_done();
            return;
        }
        self.streams.start();
    }

    /// Pauses every stream.
    pub fn stop(&self) {
        self.streams.stop();
    }

    /// Rewinds every stream to its first phase.
    pub fn reset(&self) {
        self.streams.reset();
    }

    /// Pushes a visibility change to the gate. Ignored without a gate.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn set_visible(&self, visible: bool) {
        match &self.gate {
            Some(gate) => gate.set_visible(visible),
            None => trace!(surface = %self.name, visible, "no gate; visibility ignored"),
        }
    }

    /// Fires a signal exit on every stream waiting for one.
    ///
    /// Returns how many streams advanced.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn signal(&self) -> usize {
        let advanced = self
            .streams
            .iter()
            .filter(|(_, sequencer)| sequencer.signal())
            .count();
        debug!(surface = %self.name, advanced, "signal");
        advanced
    }

    /// The gate, when the surface has one.
    #[must_use]
    pub const fn gate(&self) -> Option<&VisibilityGate<Streams>> {
        self.gate.as_ref()
    }

    /// Surface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Streams by name, in declaration order.
    pub fn streams(&self) -> impl Iterator<Item = (&str, &Sequencer)> {
        self.streams.iter()
    }

    /// Stream by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&Sequencer> {
        self.streams
            .entries
            .get(name)
            .map(|stream| &stream.sequencer)
    }

    /// Whether every stream reached its terminal phase.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.streams.all_terminal()
    }

    /// Waits until every stream is terminal.
    pub async fn completed(&self) {
        for stream in self.streams.entries.values() {
            stream.sequencer.completed().await;
        }
    }

    /// Subscribes to every stream's events.
    #[must_use]
    pub fn subscribe(&self) -> Vec<(String, mpsc::UnboundedReceiver<SequencerEvent>)> {
        self.streams
            .iter()
            .map(|(name, sequencer)| (name.to_string(), sequencer.subscribe()))
            .collect()
    }

    /// Empty transcript with one entry per stream.
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        Transcript::new(self.streams.iter().map(|(name, _)| name))
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("name", &self.name)
            .field("streams", &self.streams.entries.keys().collect::<Vec<_>>())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// What one stream has put on screen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTranscript {
    /// Completed lines, oldest first
    pub lines: Vec<String>,
    /// Revealed part of the line being typed
    pub partial: String,
    /// Last ramp value
    pub progress: Option<u8>,
    /// Current phase name
    pub phase: String,
    /// Whether the stream is terminal
    pub complete: bool,
}

/// Screen model folded from sequencer events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    streams: IndexMap<String, StreamTranscript>,
}

impl Transcript {
    /// Transcript with an empty entry per stream name.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            streams: names
                .into_iter()
                .map(|name| (name.to_string(), StreamTranscript::default()))
                .collect(),
        }
    }

    /// Folds one event of `stream` into the transcript.
    pub fn apply(&mut self, stream: &str, event: &SequencerEvent) {
        let entry = self.streams.entry(stream.to_string()).or_default();
        match event {
            SequencerEvent::PhaseEntered { phase, .. } => {
                entry.phase.clone_from(phase);
                entry.partial.clear();
            }
            SequencerEvent::Typewriter { event, .. } => match event {
                PlaybackEvent::Revealed { text, .. } => entry.partial.clone_from(text),
                PlaybackEvent::LineCompleted { text, .. } => {
                    entry.lines.push(text.clone());
                    entry.partial.clear();
                }
                PlaybackEvent::Wrapped { .. } => entry.lines.clear(),
                PlaybackEvent::Complete => entry.partial.clear(),
                PlaybackEvent::Reset => {
                    entry.lines.clear();
                    entry.partial.clear();
                }
            },
            SequencerEvent::Ramp { event, .. } => match event {
                RampEvent::Progress(value) => entry.progress = Some(*value),
                RampEvent::Complete => entry.progress = Some(100),
                RampEvent::Reset => entry.progress = None,
            },
            SequencerEvent::Transition(transition) => {
                entry.phase.clone_from(&transition.to_phase);
            }
            SequencerEvent::Complete => {
                entry.complete = true;
                entry.partial.clear();
            }
            SequencerEvent::Reset => *entry = StreamTranscript::default(),
        }
    }

    /// Entry of `stream`.
    #[must_use]
    pub fn stream(&self, stream: &str) -> Option<&StreamTranscript> {
        self.streams.get(stream)
    }

    /// Entries in stream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StreamTranscript)> {
        self.streams
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }
}
