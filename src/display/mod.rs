// src/display/mod.rs

pub mod terminal;

pub use terminal::TerminalRenderer;

use crate::config::DisplayConfig;
use crate::error::Result;
use crate::spectral::Snapshot;

/// Anything that can show the scrolling history.
///
/// `freqs` labels the snapshot's rows and `times` (seconds) its columns.
pub trait Renderer {
    fn display(&mut self, snapshot: Snapshot<'_>, freqs: &[f32], times: &[f32]) -> Result<()>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn display(&mut self, snapshot: Snapshot<'_>, freqs: &[f32], times: &[f32]) -> Result<()> {
        (**self).display(snapshot, freqs, times)
    }
}

/// Maps non-negative power values to 0..=1 on a dB scale.
#[derive(Debug, Clone, Copy)]
pub struct LogScale {
    floor: f32,
    floor_db: f32,
    ceiling_db: Option<f32>,
    range_db: f32,
}

impl LogScale {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            floor: display.floor,
            floor_db: to_db(display.floor),
            ceiling_db: display.ceiling.map(to_db),
            range_db: display.dynamic_range_db,
        }
    }

    /// dB window `(lo, hi)` for a view whose loudest cell is `peak`.
    pub fn bounds(&self, peak: f32) -> (f32, f32) {
        if let Some(hi) = self.ceiling_db {
            return (self.floor_db, hi);
        }
        let hi = to_db(peak.max(self.floor));
        let lo = (hi - self.range_db).max(self.floor_db);
        if hi - lo < f32::EPSILON {
            // nothing above the floor: keep the floor at the bottom of the scale
            (lo, lo + self.range_db)
        } else {
            (lo, hi)
        }
    }

    pub fn normalize(&self, value: f32, (lo, hi): (f32, f32)) -> f32 {
        ((to_db(value.max(self.floor)) - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}

fn to_db(v: f32) -> f32 {
    10.0 * v.log10()
}

/// The classic "jet" colormap: dark blue -> cyan -> yellow -> dark red.
pub fn jet(t: f32) -> (u8, u8, u8) {
    let t = t.clamp(0.0, 1.0);
    let channel = |offset: f32| {
        let v = (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    (channel(3.0), channel(2.0), channel(1.0))
}
