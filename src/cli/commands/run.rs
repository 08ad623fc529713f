//! `run` command: plays a surface in the terminal.

use std::io::{IsTerminal, Write};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, warn};

use crate::cli::args::{ColorChoice, RenderMode, RunArgs};
use crate::cli::shutdown::Shutdown;
use crate::config::ConfigLoader;
use crate::error::{RenderError, TextplayError};
use crate::gate::GatePolicy;
use crate::observability::logging::use_ansi;
use crate::observability::{Event, EventEmitter, StopReason, init_metrics};
use crate::presets;
use crate::render::{CURSOR_BLINK, RenderStyle, Renderer};
use crate::sequencer::{ExitCondition, SequencerEvent};
use crate::state::FlagStore;
use crate::surface::{Surface, SurfaceOptions, SurfaceSpec};

/// A surface plus the visibility changes to replay against it.
#[derive(Debug)]
struct Program {
    spec: SurfaceSpec,
    timeline: Vec<(Duration, bool)>,
}

/// Play a preset or surface file.
///
/// # Errors
///
/// Returns a usage error for an unknown preset, a config error for an
/// invalid surface file, or an I/O error from the terminal, the state
/// file or the event file.
pub async fn run(
    args: &RunArgs,
    color: ColorChoice,
    shutdown: &Shutdown,
) -> Result<(), TextplayError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let Program { spec, timeline } = resolve(args)?;
    let name = spec.name.clone();

    let store = args.state_file.as_ref().map(FlagStore::new);
    let already_completed = match &store {
        Some(store) if args.replay => {
            store.clear(&name)?;
            false
        }
        Some(store) => store.is_completed(&name)?,
        None => false,
    };

    let emitter = match &args.events {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let stream_names: Vec<String> = spec.streams.iter().map(|s| s.name.clone()).collect();
    let needs_signal = spec
        .streams
        .iter()
        .flat_map(|stream| &stream.phases)
        .any(|phase| phase.exit == ExitCondition::Signal);

    let surface = Surface::new(
        spec,
        SurfaceOptions {
            reduced_motion: args.reduced_motion,
            already_completed,
        },
    );

    let stdout = std::io::stdout();
    let is_tty = stdout.is_terminal();
    let style = RenderStyle {
        color: use_ansi(color, is_tty),
        live: match args.render {
            RenderMode::Auto => is_tty,
            RenderMode::Live => true,
            RenderMode::Plain => false,
        },
    };
    let mut renderer = Renderer::new(stdout, style, stream_names.len());

    info!(
        surface = %name,
        already_completed,
        reduced_motion = args.reduced_motion,
        live = style.live,
        "playing surface"
    );
    emitter.emit(Event::RunStarted {
        timestamp: Utc::now(),
        surface: name.clone(),
        streams: stream_names,
        reduced_motion: args.reduced_motion,
    });

    let signals = needs_signal.then(spawn_stdin_signals);
    let started = std::time::Instant::now();
    let reason = play(&surface, &timeline, &mut renderer, &emitter, signals, shutdown).await?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    emitter.emit(Event::RunCompleted {
        timestamp: Utc::now(),
        surface: name.clone(),
        reason,
        duration_ms,
    });
    info!(surface = %name, ?reason, duration_ms, "run finished");

    if reason == StopReason::Completed {
        if let Some(store) = &store {
            store.mark_completed(&name)?;
        }
    }
    Ok(())
}

fn resolve(args: &RunArgs) -> Result<Program, TextplayError> {
    if let Some(name) = &args.preset {
        let preset = presets::find(name).ok_or_else(|| {
            TextplayError::Usage(presets::suggest(name).map_or_else(
                || {
                    format!(
                        "unknown preset '{name}'. Available: {}",
                        presets::names().collect::<Vec<_>>().join(", ")
                    )
                },
                |hint| format!("unknown preset '{name}'. Did you mean '{hint}'?"),
            ))
        })?;
        return Ok(Program {
            spec: preset.spec(),
            timeline: vec![(Duration::ZERO, true)],
        });
    }

    let Some(path) = &args.config else {
        return Err(TextplayError::Usage(
            "either --preset or --config is required".to_string(),
        ));
    };

    info!(config = %path.display(), "loading surface");
    let loaded = ConfigLoader::with_defaults().load(path)?;
    for warning in &loaded.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(Program {
        spec: loaded.config.to_spec()?,
        timeline: loaded.config.timeline()?,
    })
}

/// Forwards each line read from stdin as a signal.
fn spawn_stdin_signals() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Drives `surface` until it completes, the timeline leaves it hidden, or
/// `shutdown` fires.
///
/// Starts an ungated surface at once; a gated one starts when the
/// timeline first shows it. Every event is rendered and reported to
/// `emitter`. Each message on `signals` fires signal exits.
///
/// # Errors
///
/// Returns [`TextplayError::Render`] if the output can't be written.
pub async fn play<W: Write>(
    surface: &Surface,
    timeline: &[(Duration, bool)],
    renderer: &mut Renderer<W>,
    emitter: &EventEmitter,
    mut signals: Option<mpsc::UnboundedReceiver<()>>,
    shutdown: &Shutdown,
) -> Result<StopReason, TextplayError> {
    let mut events = StreamMap::new();
    for (name, rx) in surface.subscribe() {
        events.insert(name, UnboundedReceiverStream::new(rx));
    }

    let started = Instant::now();
    if surface.gate().is_none() {
        surface.start();
    }

    let mut steps = timeline.iter().copied().peekable();
    let mut shown = false;
    let mut blink = tokio::time::interval(CURSOR_BLINK);
    blink.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let cancel = shutdown.token();
    let completed = surface.completed();
    tokio::pin!(completed);

    let reason = loop {
        // A step past the end of the clock is never reached.
        let next_step = steps.peek().and_then(|(at, _)| started.checked_add(*at));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                break shutdown.reason().unwrap_or(StopReason::Interrupted);
            }
            Some((stream, event)) = events.next() => {
                forward(renderer, emitter, &stream, &event)?;
            }
            () = sleep_until(next_step) => {
                let Some((_, visible)) = steps.next() else { continue };
                debug!(surface = %surface.name(), visible, "visibility changed");
                surface.set_visible(visible);
                emitter.emit(Event::VisibilityChanged {
                    timestamp: Utc::now(),
                    visible,
                });
                shown |= visible;
                if steps.peek().is_none() && !surface.is_complete() && paused(surface, shown) {
                    break StopReason::Hidden;
                }
            }
            signal = recv(&mut signals) => match signal {
                Some(()) => {
                    surface.signal();
                }
                None => signals = None,
            },
            () = &mut completed => break StopReason::Completed,
            _ = blink.tick() => renderer.blink()?,
        }
    };

    // Events published alongside completion may still be queued.
    for (stream, rx) in events.iter_mut() {
        while let Ok(event) = rx.as_mut().try_recv() {
            forward(renderer, emitter, stream, &event)?;
        }
    }
    renderer.finish()?;
    Ok(reason)
}

/// Whether a hidden gate holds the surface with nothing left to show it.
/// A once-only gate keeps playing after its first showing.
fn paused(surface: &Surface, shown: bool) -> bool {
    surface.gate().is_some_and(|gate| {
        !gate.is_visible()
            && (!shown || matches!(gate.policy(), GatePolicy::RestartOnReentry { .. }))
    })
}

fn forward<W: Write>(
    renderer: &mut Renderer<W>,
    emitter: &EventEmitter,
    stream: &str,
    event: &SequencerEvent,
) -> Result<(), RenderError> {
    if let Some(structured) = Event::from_sequencer(stream, event) {
        emitter.emit(structured);
    }
    renderer.handle(stream, event)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv(signals: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
