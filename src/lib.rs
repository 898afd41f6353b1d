// src/lib.rs

//! Live spectrogram: turns a stream of fixed-size microphone frames into a
//! scrolling time-frequency image.
//!
//! ```no_run
//! use live_spectrogram::{AnalysisLoop, SpectrogramConfig, TerminalRenderer, ToneSource};
//!
//! let config = SpectrogramConfig::default();
//! let source = ToneSource::new(&config, 1000.0, 0.5)?;
//! let renderer = TerminalRenderer::stdout(&config.display)?;
//! let mut session = AnalysisLoop::start(config, source, renderer)?;
//! session.tick()?;
//! session.stop();
//! # Ok::<(), live_spectrogram::SpectrogramError>(())
//! ```

pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod session;
pub mod spectral;

pub use capture::{FrameSource, MicSource, SampleFrame, ToneSource};
pub use config::{DisplayConfig, Scaling, SpectrogramConfig};
pub use display::{Renderer, TerminalRenderer};
pub use error::SpectrogramError;
pub use session::{AnalysisLoop, LoopState};
pub use spectral::{ScrollBuffer, Snapshot, SpectralSlice, SpectralTransformer};
