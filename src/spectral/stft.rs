// src/spectral/stft.rs

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::capture::SampleFrame;
use crate::config::{Scaling, SpectrogramConfig};
use crate::error::{Result, SpectrogramError};
use crate::spectral::SpectralSlice;
use crate::spectral::window::hann;

/// Short-time Fourier transform of whole frames.
///
/// The FFT plan, window and scratch buffers are built once, so `transform`
/// does not allocate anything beyond the output slice.
pub struct SpectralTransformer {
    sample_rate: u32,
    n_fft: usize,
    hop: usize,
    scaling: Scaling,

    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_sum: f32,
    window_power: f32,
    freqs: Vec<f32>,

    segment: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralTransformer {
    pub fn new(config: &SpectrogramConfig) -> Result<Self> {
        config.validate()?;

        let n_fft = config.n_fft;
        let window = hann(n_fft)?;
        let window_sum: f32 = window.iter().sum();
        let window_power: f32 = window.iter().map(|w| w * w).sum();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let bin_width = config.sample_rate as f32 / n_fft as f32;
        let freqs = (0..config.rows()).map(|k| k as f32 * bin_width).collect();

        Ok(Self {
            sample_rate: config.sample_rate,
            n_fft,
            hop: config.hop(),
            scaling: config.scaling,
            fft,
            window,
            window_sum,
            window_power,
            freqs,
            segment: vec![Complex::new(0.0, 0.0); n_fft],
            scratch,
        })
    }

    pub fn rows(&self) -> usize {
        self.freqs.len()
    }

    pub fn freqs(&self) -> &[f32] {
        &self.freqs
    }

    /// Columns produced by a frame of `len` samples. A trailing partial
    /// segment is dropped, never padded.
    pub fn segments_for(&self, len: usize) -> usize {
        if len < self.n_fft {
            0
        } else {
            (len - self.n_fft) / self.hop + 1
        }
    }

    /// Segment centres in seconds, relative to the frame start.
    pub fn bins_for(&self, len: usize) -> Vec<f32> {
        let rate = self.sample_rate as f32;
        let half = (self.n_fft / 2) as f32;
        (0..self.segments_for(len))
            .map(|j| ((j * self.hop) as f32 + half) / rate)
            .collect()
    }

    pub fn transform(&mut self, frame: &SampleFrame) -> Result<SpectralSlice> {
        let samples = frame.samples();
        if samples.len() < self.n_fft {
            return Err(SpectrogramError::FrameTooShort {
                len: samples.len(),
                n_fft: self.n_fft,
            });
        }

        let columns = self.segments_for(samples.len());
        let rows = self.rows();
        let mut data = Vec::with_capacity(rows * columns);

        for j in 0..columns {
            let start = j * self.hop;
            let segment = &samples[start..start + self.n_fft];

            for ((dst, &s), &w) in self.segment.iter_mut().zip(segment).zip(&self.window) {
                *dst = Complex::new(s as f32 * w, 0.0);
            }

            self.fft
                .process_with_scratch(&mut self.segment, &mut self.scratch);

            for (k, c) in self.segment[..rows].iter().enumerate() {
                data.push(self.scale(k, *c));
            }
        }

        SpectralSlice::new(self.freqs.clone(), self.bins_for(samples.len()), data)
    }

    fn scale(&self, k: usize, c: Complex<f32>) -> f32 {
        match self.scaling {
            Scaling::Magnitude => c.norm() / self.window_sum,
            Scaling::Psd => {
                let psd = c.norm_sqr() / (self.sample_rate as f32 * self.window_power);
                // One-sided spectrum: fold the negative frequencies back in,
                // except for DC and (even n_fft) Nyquist which have no mirror.
                let nyquist = self.n_fft % 2 == 0 && k == self.n_fft / 2;
                if k == 0 || nyquist { psd } else { 2.0 * psd }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sine_frame(config: &SpectrogramConfig, freq: f32, amplitude: f32) -> SampleFrame {
        let rate = config.sample_rate as f32;
        let samples = (0..config.frame_size)
            .map(|i| {
                let t = i as f32 / rate;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()) as i16
            })
            .collect();
        SampleFrame::new(samples)
    }

    #[test]
    fn reference_frame_shape() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let slice = stft.transform(&SampleFrame::new(vec![0; 8192])).unwrap();

        assert_eq!(slice.rows(), 513);
        assert_eq!(slice.columns(), 299);
        assert_eq!(slice.freqs()[0], 0.0);
        assert_eq!(*slice.freqs().last().unwrap(), 8000.0);
        assert!(slice.freqs().windows(2).all(|w| w[0] < w[1]));

        assert_eq!(slice.bins().len(), 299);
        assert!(slice.bins().windows(2).all(|w| w[0] < w[1]));
        assert!((slice.bins()[0] - 512.0 / 16_000.0).abs() < 1e-6);
    }

    #[test]
    fn rows_follow_n_fft_for_other_shapes() {
        for (n_fft, overlap, frame_size) in [(256, 128, 4096), (512, 0, 2000), (255, 200, 1000)] {
            let config = SpectrogramConfig {
                n_fft,
                overlap,
                frame_size,
                ..Default::default()
            };
            let mut stft = SpectralTransformer::new(&config).unwrap();
            let slice = stft.transform(&SampleFrame::new(vec![1; frame_size])).unwrap();
            assert_eq!(slice.rows(), n_fft / 2 + 1);
            assert_eq!(slice.columns(), config.columns_per_frame());
            assert_eq!(slice.freqs()[0], 0.0);
            assert!(slice.freqs().windows(2).all(|w| w[0] < w[1]));
            assert!(slice.bins().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn short_frame_is_rejected() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let err = stft.transform(&SampleFrame::new(vec![0; 1023])).unwrap_err();
        assert!(matches!(
            err,
            SpectrogramError::FrameTooShort { len: 1023, n_fft: 1024 }
        ));
    }

    #[test]
    fn partial_tail_is_dropped() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let exact = stft.transform(&SampleFrame::new(vec![0; 1024])).unwrap();
        assert_eq!(exact.columns(), 1);
        let ragged = stft.transform(&SampleFrame::new(vec![0; 1024 + 23])).unwrap();
        assert_eq!(ragged.columns(), 1);
        let two = stft.transform(&SampleFrame::new(vec![0; 1024 + 24])).unwrap();
        assert_eq!(two.columns(), 2);
    }

    #[test]
    fn silence_is_zero_and_output_non_negative() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let silent = stft.transform(&SampleFrame::new(vec![0; 8192])).unwrap();
        assert!(silent.as_column_major().iter().all(|&v| v == 0.0));

        let loud = stft.transform(&sine_frame(&config, 440.0, 8000.0)).unwrap();
        assert!(loud.as_column_major().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn transform_is_repeatable() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<i16> = (0..8192).map(|_| rng.random_range(-3000..3000)).collect();
        let frame = SampleFrame::new(samples);

        let first = stft.transform(&frame).unwrap();
        let second = stft.transform(&frame).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sine_peaks_at_its_frequency() {
        let config = SpectrogramConfig::default();
        let mut stft = SpectralTransformer::new(&config).unwrap();

        for freq in [250.0_f32, 1000.0, 3125.0, 5000.0] {
            let slice = stft.transform(&sine_frame(&config, freq, 10_000.0)).unwrap();
            let expected = (freq / 15.625).round() as usize;
            for col in [0, slice.columns() / 2, slice.columns() - 1] {
                let peak = slice.peak_row(col);
                assert!(
                    peak.abs_diff(expected) <= 1,
                    "{freq} Hz peaked at row {peak} ({} Hz)",
                    slice.freqs()[peak]
                );
            }
        }
    }

    #[test]
    fn magnitude_of_constant_signal_is_its_level() {
        let config = SpectrogramConfig {
            scaling: Scaling::Magnitude,
            ..Default::default()
        };
        let mut stft = SpectralTransformer::new(&config).unwrap();
        let slice = stft.transform(&SampleFrame::new(vec![100; 8192])).unwrap();
        for col in 0..slice.columns() {
            assert!((slice.get(0, col) - 100.0).abs() < 1e-2);
        }
    }

    #[test]
    fn psd_doubles_interior_bins_only() {
        let config = SpectrogramConfig {
            n_fft: 8,
            overlap: 0,
            frame_size: 8,
            sample_rate: 8,
            ..Default::default()
        };
        let stft = SpectralTransformer::new(&config).unwrap();
        let c = Complex::new(3.0, 4.0);
        let base = 25.0 / (8.0 * stft.window_power);
        assert!((stft.scale(0, c) - base).abs() < 1e-6);
        assert!((stft.scale(2, c) - 2.0 * base).abs() < 1e-6);
        assert!((stft.scale(4, c) - base).abs() < 1e-6);
    }
}
