// src/capture/tone.rs

use std::f64::consts::TAU;

use crate::capture::{FrameSource, SampleFrame};
use crate::config::SpectrogramConfig;
use crate::error::{Result, SpectrogramError};

/// Synthetic sine source for sanity-checking the display without a microphone.
///
/// Phase carries over between frames, so consecutive frames join without a
/// discontinuity.
pub struct ToneSource {
    sample_rate: u32,
    frame_size: usize,
    freq_hz: f64,
    amplitude: f64,
    position: u64,
    closed: bool,
}

impl ToneSource {
    /// `amplitude` is a fraction of full scale, clamped to [0, 1].
    pub fn new(config: &SpectrogramConfig, freq_hz: f32, amplitude: f32) -> Result<Self> {
        config.validate()?;
        let nyquist = config.sample_rate as f32 / 2.0;
        if !(freq_hz >= 0.0 && freq_hz <= nyquist) {
            return Err(SpectrogramError::InvalidConfig(format!(
                "tone frequency {freq_hz} Hz is outside 0..={nyquist} Hz"
            )));
        }
        Ok(Self {
            sample_rate: config.sample_rate,
            frame_size: config.frame_size,
            freq_hz: freq_hz as f64,
            amplitude: amplitude.clamp(0.0, 1.0) as f64 * i16::MAX as f64,
            position: 0,
            closed: false,
        })
    }
}

impl FrameSource for ToneSource {
    fn acquire_frame(&mut self) -> Result<SampleFrame> {
        if self.closed {
            return Err(SpectrogramError::Device("tone source is closed".into()));
        }

        let rate = self.sample_rate as f64;
        let start = self.position;
        let samples = (0..self.frame_size as u64)
            .map(|i| {
                let t = (start + i) as f64 / rate;
                (self.amplitude * (TAU * self.freq_hz * t).sin()).round() as i16
            })
            .collect();
        self.position += self.frame_size as u64;

        Ok(SampleFrame::new(samples))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_configured_length() {
        let config = SpectrogramConfig::default();
        let mut tone = ToneSource::new(&config, 1000.0, 0.5).unwrap();
        let frame = tone.acquire_frame().unwrap();
        assert_eq!(frame.len(), 8192);
        let peak = frame.samples().iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 16_000 && peak <= 16_384);
    }

    #[test]
    fn phase_continues_across_frames() {
        let config = SpectrogramConfig {
            frame_size: 1024,
            ..Default::default()
        };
        let mut tone = ToneSource::new(&config, 440.0, 1.0).unwrap();
        let mut joined = tone.acquire_frame().unwrap().samples().to_vec();
        joined.extend_from_slice(tone.acquire_frame().unwrap().samples());

        let mut fresh = ToneSource::new(
            &SpectrogramConfig {
                frame_size: 2048,
                ..Default::default()
            },
            440.0,
            1.0,
        )
        .unwrap();
        assert_eq!(joined, fresh.acquire_frame().unwrap().samples());
    }

    #[test]
    fn closed_source_reports_device_error() {
        let mut tone = ToneSource::new(&SpectrogramConfig::default(), 440.0, 0.5).unwrap();
        tone.close();
        assert!(matches!(
            tone.acquire_frame(),
            Err(SpectrogramError::Device(_))
        ));
    }

    #[test]
    fn tone_above_nyquist_is_rejected() {
        let config = SpectrogramConfig::default();
        assert!(ToneSource::new(&config, 9000.0, 0.5).is_err());
    }
}
