// src/capture/mod.rs

pub mod input;
pub mod tone;

pub use input::MicSource;
pub use tone::ToneSource;

use crate::error::Result;

/// One blocking read worth of mono samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame {
    samples: Vec<i16>,
}

impl SampleFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Where frames come from.
///
/// `acquire_frame` blocks until a full frame is available (or the source's
/// own timeout fires). `close` releases the underlying device and must be
/// safe to call more than once.
pub trait FrameSource {
    fn acquire_frame(&mut self) -> Result<SampleFrame>;
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire_frame(&mut self) -> Result<SampleFrame> {
        (**self).acquire_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
