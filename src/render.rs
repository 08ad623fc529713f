//! Terminal rendering of surface events.
//!
//! Two modes:
//! - **live**: redraws the line being typed in place with a blinking
//!   cursor, and the progress bar as it fills (for terminals)
//! - **plain**: prints each finished line once and the progress bar at
//!   quarter steps (for pipes, logs and tests)
//!
//! Line colours come from [`LineKind`]; colour is off unless requested.

use std::io::Write;
use std::time::Duration;

use crate::error::RenderError;
use crate::playback::PlaybackEvent;
use crate::ramp::RampEvent;
use crate::script::LineKind;
use crate::sequencer::SequencerEvent;

/// Cursor blink half-period.
pub const CURSOR_BLINK: Duration = Duration::from_millis(530);

/// Width of the progress bar in cells.
pub const BAR_WIDTH: usize = 30;

const CLEAR_LINE: &str = "\r\x1b[2K";
const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const DARK_GREY: &str = "\x1b[90m";

/// Output style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStyle {
    /// Emit ANSI colours
    pub color: bool,
    /// Redraw in place instead of printing finished lines only
    pub live: bool,
}

/// Builds `━━━━──── 40%` for a value in `0..=100`.
#[must_use]
pub fn build_progress_bar(width: usize, percent: u8) -> String {
    let percent = percent.min(100);
    let filled = width * usize::from(percent) / 100;
    let mut bar = String::with_capacity(width * 3 + 5);
    bar.extend(std::iter::repeat_n('━', filled));
    bar.extend(std::iter::repeat_n('─', width - filled));
    bar.push_str(&format!(" {percent:>3}%"));
    bar
}

const fn line_color(kind: LineKind) -> Option<&'static str> {
    match kind {
        LineKind::Ok => Some(GREEN),
        LineKind::Error => Some(RED),
        LineKind::Command => Some(CYAN),
        LineKind::Plain => None,
    }
}

/// Writes surface events to a terminal or any other writer.
#[derive(Debug)]
pub struct Renderer<W: Write> {
    out: W,
    style: RenderStyle,
    multi_stream: bool,
    /// Stream and text of the line being typed (live mode)
    partial: Option<(String, String)>,
    cursor_visible: bool,
    /// Last quarter step printed per ramp (plain mode)
    last_step: Option<u8>,
}

impl<W: Write> Renderer<W> {
    /// Renderer for a surface with `stream_count` streams. Lines are
    /// prefixed with their stream name when there is more than one.
    pub const fn new(out: W, style: RenderStyle, stream_count: usize) -> Self {
        Self {
            out,
            style,
            multi_stream: stream_count > 1,
            partial: None,
            cursor_visible: true,
            last_step: None,
        }
    }

    /// Renders one event of `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Write`] if the output can't be written.
    pub fn handle(&mut self, stream: &str, event: &SequencerEvent) -> Result<(), RenderError> {
        match event {
            SequencerEvent::Typewriter { event, .. } => self.typewriter(stream, event)?,
            SequencerEvent::Ramp { event, .. } => self.ramp(stream, *event)?,
            SequencerEvent::Reset => self.clear_partial()?,
            SequencerEvent::PhaseEntered { .. }
            | SequencerEvent::Transition(_)
            | SequencerEvent::Complete => {}
        }
        self.out.flush()?;
        Ok(())
    }

    /// Toggles the cursor and redraws the line being typed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Write`] if the output can't be written.
    pub fn blink(&mut self) -> Result<(), RenderError> {
        self.cursor_visible = !self.cursor_visible;
        if self.style.live && self.partial.is_some() {
            self.draw_partial()?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Clears any half-typed line so the terminal is left clean.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Write`] if the output can't be written.
    pub fn finish(&mut self) -> Result<(), RenderError> {
        self.clear_partial()?;
        self.out.flush()?;
        Ok(())
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn typewriter(&mut self, stream: &str, event: &PlaybackEvent) -> Result<(), RenderError> {
        match event {
            PlaybackEvent::Revealed { text, .. } => {
                if self.style.live {
                    self.partial = Some((stream.to_string(), text.clone()));
                    self.cursor_visible = true;
                    self.draw_partial()?;
                }
            }
            PlaybackEvent::LineCompleted { text, .. } => {
                if self.style.live {
                    self.partial = None;
                    self.out.write_all(CLEAR_LINE.as_bytes())?;
                }
                let line = self.decorate(stream, text);
                writeln!(self.out, "{line}")?;
            }
            PlaybackEvent::Reset => self.clear_partial()?,
            PlaybackEvent::Wrapped { .. } | PlaybackEvent::Complete => {}
        }
        Ok(())
    }

    fn ramp(&mut self, stream: &str, event: RampEvent) -> Result<(), RenderError> {
        match event {
            RampEvent::Progress(percent) => {
                if self.style.live {
                    let bar = self.decorate_bar(stream, percent);
                    write!(self.out, "{CLEAR_LINE}{bar}")?;
                } else {
                    let step = percent / 25 * 25;
                    if step > 0 && self.last_step.is_none_or(|last| step > last) {
                        self.last_step = Some(step);
                        let bar = self.decorate_bar(stream, step);
                        writeln!(self.out, "{bar}")?;
                    }
                }
            }
            RampEvent::Complete => {
                if self.style.live {
                    writeln!(self.out)?;
                } else if self.last_step != Some(100) {
                    let bar = self.decorate_bar(stream, 100);
                    writeln!(self.out, "{bar}")?;
                }
                self.last_step = None;
            }
            RampEvent::Reset => {
                self.last_step = None;
                if self.style.live {
                    self.out.write_all(CLEAR_LINE.as_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn clear_partial(&mut self) -> Result<(), RenderError> {
        if self.partial.take().is_some() {
            self.out.write_all(CLEAR_LINE.as_bytes())?;
        }
        Ok(())
    }

    fn draw_partial(&mut self) -> Result<(), RenderError> {
        let Some((stream, text)) = &self.partial else {
            return Ok(());
        };
        let line = self.decorate(stream, text);
        let cursor = if self.cursor_visible { '█' } else { ' ' };
        write!(self.out, "{CLEAR_LINE}{line}{cursor}")?;
        Ok(())
    }

    fn prefix(&self, stream: &str) -> String {
        match (self.multi_stream, self.style.color) {
            (false, _) => String::new(),
            (true, false) => format!("[{stream}] "),
            (true, true) => format!("{DARK_GREY}[{stream}]{RESET} "),
        }
    }

    fn decorate(&self, stream: &str, text: &str) -> String {
        let prefix = self.prefix(stream);
        match line_color(LineKind::classify(text)).filter(|_| self.style.color) {
            Some(color) => format!("{prefix}{color}{text}{RESET}"),
            None => format!("{prefix}{text}"),
        }
    }

    fn decorate_bar(&self, stream: &str, percent: u8) -> String {
        let prefix = self.prefix(stream);
        let bar = build_progress_bar(BAR_WIDTH, percent);
        if self.style.color {
            format!("{prefix}{GREEN}{bar}{RESET}")
        } else {
            format!("{prefix}{bar}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackCursor;

    fn revealed(text: &str) -> SequencerEvent {
        SequencerEvent::Typewriter {
            index: 0,
            event: PlaybackEvent::Revealed {
                cursor: PlaybackCursor::new(0, text.chars().count()),
                text: text.to_string(),
            },
        }
    }

    fn completed(text: &str) -> SequencerEvent {
        SequencerEvent::Typewriter {
            index: 0,
            event: PlaybackEvent::LineCompleted {
                line_index: 0,
                text: text.to_string(),
            },
        }
    }

    fn progress(percent: u8) -> SequencerEvent {
        SequencerEvent::Ramp {
            index: 0,
            event: RampEvent::Progress(percent),
        }
    }

    fn output(renderer: Renderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(build_progress_bar(4, 0), "────   0%");
        assert_eq!(build_progress_bar(4, 50), "━━──  50%");
        assert_eq!(build_progress_bar(4, 100), "━━━━ 100%");
        assert_eq!(build_progress_bar(4, 250), "━━━━ 100%");
    }

    #[test]
    fn test_plain_prints_finished_lines_only() {
        let mut renderer = Renderer::new(Vec::new(), RenderStyle::default(), 1);
        renderer.handle("boot", &revealed("[O")).unwrap();
        renderer.handle("boot", &completed("[OK] boot")).unwrap();
        renderer.handle("boot", &completed("")).unwrap();
        assert_eq!(output(renderer), "[OK] boot\n\n");
    }

    #[test]
    fn test_plain_prefixes_multiple_streams() {
        let mut renderer = Renderer::new(Vec::new(), RenderStyle::default(), 2);
        renderer.handle("kernel", &completed("[INFO] a")).unwrap();
        renderer.handle("commands", &completed("$ nvcc")).unwrap();
        assert_eq!(output(renderer), "[kernel] [INFO] a\n[commands] $ nvcc\n");
    }

    #[test]
    fn test_plain_progress_in_quarters() {
        let mut renderer = Renderer::new(Vec::new(), RenderStyle::default(), 1);
        for percent in [3, 20, 26, 30, 49, 51, 80, 99] {
            renderer.handle("boot", &progress(percent)).unwrap();
        }
        renderer
            .handle(
                "boot",
                &SequencerEvent::Ramp {
                    index: 0,
                    event: RampEvent::Complete,
                },
            )
            .unwrap();
        let text = output(renderer);
        let percents: Vec<_> = text
            .lines()
            .map(|l| l.rsplit(' ').next().unwrap().to_string())
            .collect();
        assert_eq!(percents, vec!["25%", "50%", "75%", "100%"]);
    }

    #[test]
    fn test_live_redraws_with_cursor() {
        let style = RenderStyle {
            color: false,
            live: true,
        };
        let mut renderer = Renderer::new(Vec::new(), style, 1);
        renderer.handle("t", &revealed("$ c")).unwrap();
        renderer.blink().unwrap();
        renderer.handle("t", &completed("$ cd")).unwrap();
        assert_eq!(
            output(renderer),
            format!("{CLEAR_LINE}$ c█{CLEAR_LINE}$ c {CLEAR_LINE}$ cd\n")
        );
    }

    #[test]
    fn test_colors_follow_line_kind() {
        let style = RenderStyle {
            color: true,
            live: false,
        };
        let mut renderer = Renderer::new(Vec::new(), style, 1);
        renderer.handle("t", &completed("[OK] ready")).unwrap();
        renderer.handle("t", &completed("ERROR: x")).unwrap();
        renderer.handle("t", &completed("plain")).unwrap();
        assert_eq!(
            output(renderer),
            format!("{GREEN}[OK] ready{RESET}\n{RED}ERROR: x{RESET}\nplain\n")
        );
    }

    #[test]
    fn test_finish_clears_partial_line() {
        let style = RenderStyle {
            color: false,
            live: true,
        };
        let mut renderer = Renderer::new(Vec::new(), style, 1);
        renderer.handle("t", &revealed("ab")).unwrap();
        renderer.finish().unwrap();
        renderer.finish().unwrap();
        assert_eq!(output(renderer), format!("{CLEAR_LINE}ab█{CLEAR_LINE}"));
    }
}
