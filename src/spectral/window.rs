// src/spectral/window.rs

use std::f32::consts::PI;

use crate::error::{Result, SpectrogramError};

/// Symmetric Hann window of `len` points.
///
/// Zero at both ends, 1.0 at the centre. The transformer divides by the
/// window sums, so no normalisation is applied here.
pub fn hann(len: usize) -> Result<Vec<f32>> {
    if len == 0 {
        return Err(SpectrogramError::InvalidLength(len));
    }
    if len == 1 {
        return Ok(vec![1.0]);
    }

    let denom = (len - 1) as f32;
    Ok((0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
        .collect())
}
