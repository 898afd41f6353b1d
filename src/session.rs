// src/session.rs

use std::time::{Duration, Instant};

use crate::capture::{FrameSource, SampleFrame};
use crate::config::SpectrogramConfig;
use crate::display::Renderer;
use crate::error::{Result, SpectrogramError};
use crate::spectral::{ScrollBuffer, Snapshot, SpectralTransformer};

/// Where the loop is within a tick. Anything other than `Idle` or `Stopped`
/// is only observable if a collaborator inspects the loop mid-tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Acquiring,
    Transforming,
    Updating,
    Stopped,
}

/// Drives one analysis session: acquire -> transform -> append -> display,
/// exactly once per `tick()`.
///
/// The loop owns the frame source and is the only writer of the scroll
/// buffer. It never schedules itself; a timer, a test or a manual loop
/// calls `tick()` once per frame interval.
pub struct AnalysisLoop<S: FrameSource, R: Renderer> {
    config: SpectrogramConfig,
    source: S,
    renderer: R,
    transformer: SpectralTransformer,
    buffer: ScrollBuffer,
    state: LoopState,
    /// Segment centres within one frame, used to build the time axis.
    frame_bins: Vec<f32>,
    ticks: u64,
    /// Transform + append + render time of the last tick.
    last_tick: Duration,
    /// Time the last tick spent blocked in `acquire_frame`.
    last_wait: Duration,
    source_closed: bool,
}

impl<S: FrameSource, R: Renderer> AnalysisLoop<S, R> {
    /// Validate `config`, seed the history from the first frame and show it.
    ///
    /// The source is closed again if any of that fails.
    pub fn start(config: SpectrogramConfig, mut source: S, renderer: R) -> Result<Self> {
        match Self::seed(&config, &mut source) {
            Ok((transformer, buffer, frame_bins)) => {
                log::info!(
                    "analysis session started: {} Hz, frame {}, n_fft {}, overlap {}, {} columns kept",
                    config.sample_rate,
                    config.frame_size,
                    config.n_fft,
                    config.overlap,
                    buffer.capacity()
                );
                let mut session = Self {
                    config,
                    source,
                    renderer,
                    transformer,
                    buffer,
                    state: LoopState::Idle,
                    frame_bins,
                    ticks: 0,
                    last_tick: Duration::ZERO,
                    last_wait: Duration::ZERO,
                    source_closed: false,
                };
                if let Err(e) = session.render() {
                    session.shutdown();
                    return Err(e);
                }
                Ok(session)
            }
            Err(e) => {
                source.close();
                Err(e)
            }
        }
    }

    fn seed(
        config: &SpectrogramConfig,
        source: &mut S,
    ) -> Result<(SpectralTransformer, ScrollBuffer, Vec<f32>)> {
        let mut transformer = SpectralTransformer::new(config)?;
        let frame = source.acquire_frame()?;
        let slice = transformer.transform(&frame)?;
        let buffer = ScrollBuffer::seed(&slice, config.keep_columns())?;
        let frame_bins = transformer.bins_for(config.frame_size);
        Ok((transformer, buffer, frame_bins))
    }

    /// Run one acquire/transform/update/display cycle.
    ///
    /// Any error ends the session: the source is closed, the state becomes
    /// `Stopped` and every later call returns [`SpectrogramError::Stopped`].
    pub fn tick(&mut self) -> Result<()> {
        if self.state == LoopState::Stopped {
            return Err(SpectrogramError::Stopped);
        }
        match self.step() {
            Ok(()) => {
                self.state = LoopState::Idle;
                self.ticks += 1;

                let budget = self.config.frame_duration();
                if self.last_tick > budget {
                    log::warn!(
                        "tick {} spent {:?} processing, over the {:?} frame budget",
                        self.ticks,
                        self.last_tick,
                        budget
                    );
                } else {
                    log::debug!(
                        "tick {} waited {:?}, processed in {:?}",
                        self.ticks,
                        self.last_wait,
                        self.last_tick
                    );
                }
                Ok(())
            }
            Err(e) => {
                log::error!("analysis session ending after {} ticks: {e}", self.ticks);
                self.shutdown();
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<()> {
        self.state = LoopState::Acquiring;
        let waiting = Instant::now();
        let frame = self.source.acquire_frame()?;
        self.last_wait = waiting.elapsed();
        self.check_frame(&frame);

        // The budget covers our own work only, not the blocking read.
        let started = Instant::now();
        self.state = LoopState::Transforming;
        let slice = self.transformer.transform(&frame)?;

        self.state = LoopState::Updating;
        self.buffer.append(&slice)?;
        self.render()?;
        self.last_tick = started.elapsed();
        Ok(())
    }

    fn check_frame(&self, frame: &SampleFrame) {
        if frame.len() != self.config.frame_size {
            log::warn!(
                "frame of {} samples, expected {}",
                frame.len(),
                self.config.frame_size
            );
        }
    }

    fn render(&mut self) -> Result<()> {
        let times = self.time_axis();
        self.renderer
            .display(self.buffer.snapshot(), self.transformer.freqs(), &times)
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Stopped;
        if !self.source_closed {
            self.source.close();
            self.source_closed = true;
        }
    }

    /// End the session between ticks and release the source.
    /// Returns how many ticks ran.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        log::info!("analysis session stopped after {} ticks", self.ticks);
        self.ticks
    }

    /// Seconds for every visible column.
    ///
    /// Column `c` sits in frame slot `c / per_frame` at segment `c % per_frame`,
    /// so the axis spans the whole visible history regardless of how much
    /// wall-clock time has passed.
    pub fn time_axis(&self) -> Vec<f32> {
        let per_frame = self.frame_bins.len().max(1);
        let frame_secs = self.config.frame_duration().as_secs_f32();
        (0..self.buffer.columns())
            .map(|c| {
                let bin = self.frame_bins.get(c % per_frame).copied().unwrap_or(0.0);
                bin + (c / per_frame) as f32 * frame_secs
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        self.buffer.snapshot()
    }

    pub fn freqs(&self) -> &[f32] {
        self.transformer.freqs()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Processing time of the last tick, excluding the wait for the frame.
    pub fn last_tick_duration(&self) -> Duration {
        self.last_tick
    }

    pub fn last_wait_duration(&self) -> Duration {
        self.last_wait
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<S: FrameSource, R: Renderer> Drop for AnalysisLoop<S, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
