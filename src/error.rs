// src/error.rs

use thiserror::Error;

/// Everything the analysis pipeline can fail with.
///
/// None of these are retried inside the pipeline; they surface to whoever
/// drives the [`AnalysisLoop`](crate::session::AnalysisLoop).
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("window length must be positive, got {0}")]
    InvalidLength(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame has {len} samples but the transform needs at least {n_fft}")]
    FrameTooShort { len: usize, n_fft: usize },

    #[error("slice has {found} frequency rows, buffer holds {expected}")]
    RowMismatch { expected: usize, found: usize },

    #[error("slice data holds {actual} values, axes describe {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("audio device error: {0}")]
    Device(String),

    #[error("analysis session is stopped")]
    Stopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SpectrogramError>;
