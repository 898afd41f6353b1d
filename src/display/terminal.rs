// src/display/terminal.rs

use std::fmt::Write as FmtWrite;
use std::io::{Stdout, Write, stdout};

use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, ResetColor, SetForegroundColor},
    terminal::{self, BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::config::DisplayConfig;
use crate::display::{LogScale, Renderer, jet};
use crate::error::Result;
use crate::spectral::Snapshot;

const TITLE: &str = "Real Time Spectrogram";
const LABEL_WIDTH: u16 = 8;
/// Title on top; axis, tick labels and legend underneath.
const CHROME_ROWS: u16 = 4;
const FREQ_LABEL_EVERY: usize = 4;
const TIME_LABEL_SPACING: usize = 12;

/// Draws the history as coloured block characters.
///
/// Frequency runs bottom (0 Hz) to top, time left (oldest) to right.
pub struct TerminalRenderer<W: Write> {
    out: W,
    width: u16,
    height: u16,
    scale: LogScale,
    cells: Vec<f32>,
    draw_buffer: String,
    /// Wipe the whole screen before the next frame.
    clear_pending: bool,
}

impl TerminalRenderer<Stdout> {
    /// Renderer sized to the current terminal.
    pub fn stdout(display: &DisplayConfig) -> Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::new(stdout(), width, height, display))
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, width: u16, height: u16, display: &DisplayConfig) -> Self {
        Self {
            out,
            width,
            height,
            scale: LogScale::new(display),
            cells: Vec::new(),
            draw_buffer: String::with_capacity(64 * 1024),
            clear_pending: false,
        }
    }

    /// Fit the next frame to a new terminal size. Leftovers of the old
    /// layout are cleared when it is drawn.
    pub fn resize(&mut self, width: u16, height: u16) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.clear_pending = true;
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn plot_size(&self) -> (usize, usize) {
        let h = self.height.saturating_sub(CHROME_ROWS).max(2);
        let w = self.width.saturating_sub(LABEL_WIDTH + 1).max(1);
        (h as usize, w as usize)
    }

    fn compose(&mut self, snapshot: Snapshot<'_>, freqs: &[f32], times: &[f32]) {
        let (plot_h, plot_w) = self.plot_size();
        downsample(snapshot, plot_h, plot_w, &mut self.cells);

        let bounds = self.scale.bounds(snapshot.max_value());
        let buf = &mut self.draw_buffer;
        buf.clear();

        let _ = write!(buf, "{}{}", MoveTo(0, 0), Clear(ClearType::UntilNewLine));
        let pad = (self.width as usize).saturating_sub(TITLE.len()) / 2;
        let _ = write!(buf, "{:pad$}{TITLE}", "");

        let rows = snapshot.rows().max(1);
        for cy in 0..plot_h {
            let y = 1 + cy as u16;
            let _ = write!(buf, "{}", MoveTo(0, y));

            // Label with the centre frequency of the band this line covers.
            let band = plot_h - 1 - cy;
            let (lo, hi) = span(band, plot_h, rows);
            if cy % FREQ_LABEL_EVERY == 0 || cy == plot_h - 1 {
                let hz = freqs.get((lo + hi) / 2).copied().unwrap_or(0.0);
                let _ = write!(buf, "{:>7.0}┤", hz);
            } else {
                let _ = write!(buf, "{:>7}│", "");
            }

            let mut last = None;
            for cx in 0..plot_w {
                let t = self.scale.normalize(self.cells[cy * plot_w + cx], bounds);
                let (r, g, b) = jet(t);
                if last != Some((r, g, b)) {
                    let _ = write!(buf, "{}", SetForegroundColor(Color::Rgb { r, g, b }));
                    last = Some((r, g, b));
                }
                buf.push('█');
            }
            let _ = write!(buf, "{}", ResetColor);
        }

        let axis_y = 1 + plot_h as u16;
        let _ = write!(buf, "{}{:>7} └", MoveTo(0, axis_y), "");
        buf.extend(std::iter::repeat_n('─', plot_w));

        let mut labels = vec![' '; plot_w];
        let cols = snapshot.columns();
        if cols > 0 && !times.is_empty() {
            for cx in (0..plot_w).step_by(TIME_LABEL_SPACING) {
                let (c0, _) = span(cx, plot_w, cols);
                let label = format!("{:.1}", times[c0.min(times.len() - 1)]);
                for (i, ch) in label.chars().enumerate() {
                    if let Some(slot) = labels.get_mut(cx + i) {
                        *slot = ch;
                    }
                }
            }
        }
        let _ = write!(
            buf,
            "{}{:>9}{}",
            MoveTo(0, axis_y + 1),
            "",
            labels.into_iter().collect::<String>()
        );

        let _ = write!(
            buf,
            "{}{}Time (s) | Frequency (Hz) | scale {:.0}..{:.0} dB | {} cols",
            MoveTo(0, axis_y + 2),
            Clear(ClearType::UntilNewLine),
            bounds.0,
            bounds.1,
            cols
        );
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn display(&mut self, snapshot: Snapshot<'_>, freqs: &[f32], times: &[f32]) -> Result<()> {
        self.compose(snapshot, freqs, times);

        execute!(self.out, BeginSynchronizedUpdate)?;
        if self.clear_pending {
            execute!(self.out, Clear(ClearType::All))?;
            self.clear_pending = false;
        }
        self.out.write_all(self.draw_buffer.as_bytes())?;
        execute!(self.out, EndSynchronizedUpdate)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Source index range `[lo, hi)` covered by output cell `i` of `n`, never empty.
fn span(i: usize, n: usize, len: usize) -> (usize, usize) {
    let lo = (i * len / n).min(len.saturating_sub(1));
    let hi = ((i + 1) * len / n).max(lo + 1).min(len.max(1));
    (lo, hi)
}

/// Reduce the snapshot to `plot_h x plot_w` cells (row-major, top line =
/// highest frequencies), keeping the maximum of each cell's area.
fn downsample(snapshot: Snapshot<'_>, plot_h: usize, plot_w: usize, cells: &mut Vec<f32>) {
    cells.clear();
    cells.resize(plot_h * plot_w, 0.0);

    let (rows, cols) = (snapshot.rows(), snapshot.columns());
    if rows == 0 || cols == 0 {
        return;
    }

    for cx in 0..plot_w {
        let (c0, c1) = span(cx, plot_w, cols);
        for cy in 0..plot_h {
            let (r0, r1) = span(plot_h - 1 - cy, plot_h, rows);
            let mut peak = 0.0_f32;
            for c in c0..c1 {
                let column = snapshot.column(c);
                for &v in &column[r0..r1] {
                    peak = peak.max(v);
                }
            }
            cells[cy * plot_w + cx] = peak;
        }
    }
}
