// src/config.rs
//
// Session tunables. One immutable value is handed to every component at
// construction; nothing here is module-level state.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrogramError};

/// The pipeline only ever analyses a single mono channel.
pub const CHANNELS: u16 = 1;

const CONFIG_TEMPLATE_HEADER: &str = "# live_spectrogram configuration\n\
# Every key is optional; missing keys fall back to the values below.\n\n";

/// How FFT coefficients are turned into the non-negative values we display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// One-sided power spectral density, |X|^2 / (fs * sum(w^2)).
    #[default]
    Psd,
    /// Window-normalised magnitude, |X| / sum(w).
    Magnitude,
}

/// Colour mapping for renderers that use a logarithmic scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Smallest value fed into the log; everything below is clamped to it.
    pub floor: f32,
    /// Fixed top of the colour scale. `None` tracks the loudest visible cell.
    pub ceiling: Option<f32>,
    /// Span of the auto-ranged scale, in dB below the peak.
    pub dynamic_range_db: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            floor: 0.01,
            ceiling: None,
            dynamic_range_db: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Capture rate in Hz.
    pub sample_rate: u32,
    /// Samples per acquired frame.
    pub frame_size: usize,
    /// Segment length of the STFT.
    pub n_fft: usize,
    /// Samples shared by consecutive segments, strictly below `n_fft`.
    pub overlap: usize,
    /// How many frames worth of columns stay visible.
    pub samples_per_frame: usize,
    pub scaling: Scaling,
    /// Upper bound on a single blocking frame read. Defaults to four frame durations.
    pub device_timeout_ms: Option<u64>,
    pub display: DisplayConfig,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 8_192,
            n_fft: 1024,
            overlap: 1000,
            samples_per_frame: 4,
            scaling: Scaling::Psd,
            device_timeout_ms: None,
            display: DisplayConfig::default(),
        }
    }
}

impl SpectrogramConfig {
    /// Read a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the config as a commented TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| SpectrogramError::InvalidConfig(e.to_string()))?;
        Ok(format!("{CONFIG_TEMPLATE_HEADER}{body}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_fft == 0 {
            return Err(SpectrogramError::InvalidLength(0));
        }
        if self.sample_rate == 0 {
            return Err(SpectrogramError::InvalidConfig(
                "sample_rate must be positive".into(),
            ));
        }
        if self.overlap >= self.n_fft {
            return Err(SpectrogramError::InvalidConfig(format!(
                "overlap ({}) must be smaller than n_fft ({})",
                self.overlap, self.n_fft
            )));
        }
        if self.frame_size < self.n_fft {
            return Err(SpectrogramError::InvalidConfig(format!(
                "frame_size ({}) must hold at least one n_fft ({}) segment",
                self.frame_size, self.n_fft
            )));
        }
        if self.samples_per_frame == 0 {
            return Err(SpectrogramError::InvalidConfig(
                "samples_per_frame must be at least 1".into(),
            ));
        }
        if self.device_timeout_ms == Some(0) {
            return Err(SpectrogramError::InvalidConfig(
                "device_timeout_ms must be positive".into(),
            ));
        }
        let display = &self.display;
        if !(display.floor > 0.0) {
            return Err(SpectrogramError::InvalidConfig(
                "display.floor must be positive".into(),
            ));
        }
        if let Some(ceiling) = display.ceiling {
            if !(ceiling > display.floor) {
                return Err(SpectrogramError::InvalidConfig(
                    "display.ceiling must be above display.floor".into(),
                ));
            }
        }
        if !(display.dynamic_range_db > 0.0) {
            return Err(SpectrogramError::InvalidConfig(
                "display.dynamic_range_db must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Distance between consecutive segment starts.
    pub fn hop(&self) -> usize {
        self.n_fft - self.overlap
    }

    /// Frequency rows of every slice.
    pub fn rows(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Segments that fit in `len` samples; a short tail is dropped.
    pub fn segments_for(&self, len: usize) -> usize {
        if len < self.n_fft {
            0
        } else {
            (len - self.n_fft) / self.hop() + 1
        }
    }

    pub fn columns_per_frame(&self) -> usize {
        self.segments_for(self.frame_size)
    }

    /// Column capacity of the scrolling buffer.
    pub fn keep_columns(&self) -> usize {
        self.columns_per_frame() * self.samples_per_frame
    }

    /// Wall-clock length of one frame; also the tick interval.
    pub fn frame_duration(&self) -> Duration {
        let nanos = self.frame_size as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    pub fn tick_interval(&self) -> Duration {
        self.frame_duration()
    }

    pub fn device_timeout(&self) -> Duration {
        match self.device_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.frame_duration() * 4,
        }
    }
}
