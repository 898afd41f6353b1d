// src/spectral/mod.rs

pub mod scroll;
pub mod stft;
pub mod window;

pub use scroll::{ScrollBuffer, Snapshot};
pub use stft::SpectralTransformer;

use crate::error::{Result, SpectrogramError};

/// The STFT of one frame.
///
/// `data` is column-major: column `j` (one segment) occupies
/// `data[j * rows..(j + 1) * rows]`, lowest frequency first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralSlice {
    data: Vec<f32>,
    freqs: Vec<f32>,
    bins: Vec<f32>,
}

impl SpectralSlice {
    pub fn new(freqs: Vec<f32>, bins: Vec<f32>, data: Vec<f32>) -> Result<Self> {
        let expected = freqs.len() * bins.len();
        if data.len() != expected {
            return Err(SpectrogramError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, freqs, bins })
    }

    /// A slice with every cell set to `value`.
    #[cfg(test)]
    pub(crate) fn filled(freqs: Vec<f32>, bins: Vec<f32>, value: f32) -> Self {
        let data = vec![value; freqs.len() * bins.len()];
        Self { data, freqs, bins }
    }

    pub fn rows(&self) -> usize {
        self.freqs.len()
    }

    pub fn columns(&self) -> usize {
        self.bins.len()
    }

    pub fn freqs(&self) -> &[f32] {
        &self.freqs
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn column(&self, col: usize) -> &[f32] {
        let rows = self.rows();
        &self.data[col * rows..(col + 1) * rows]
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[col * self.rows() + row]
    }

    /// Row holding the largest value of column `col`.
    pub fn peak_row(&self, col: usize) -> usize {
        self.column(col)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (row, &v)| {
                if v > best.1 { (row, v) } else { best }
            })
            .0
    }

    pub fn as_column_major(&self) -> &[f32] {
        &self.data
    }
}
