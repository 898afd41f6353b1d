// src/spectral/scroll.rs

use crate::error::{Result, SpectrogramError};
use crate::spectral::SpectralSlice;

/// Fixed-capacity history of spectral columns.
///
/// Storage is a ring of whole columns. Once `capacity` columns are held,
/// every new column overwrites the oldest one, so the visible history is
/// always the most recent `capacity` columns in arrival order.
pub struct ScrollBuffer {
    rows: usize,
    capacity: usize,
    data: Vec<f32>,
    /// Ring slot of the oldest column.
    head: usize,
    len: usize,
    total_columns: u64,
}

impl ScrollBuffer {
    /// Start a session's history from its first slice.
    pub fn seed(slice: &SpectralSlice, keep_columns: usize) -> Result<Self> {
        if keep_columns == 0 {
            return Err(SpectrogramError::InvalidConfig(
                "scroll buffer needs room for at least one column".into(),
            ));
        }
        let mut buffer = Self {
            rows: slice.rows(),
            capacity: keep_columns,
            data: vec![0.0; slice.rows() * keep_columns],
            head: 0,
            len: 0,
            total_columns: 0,
        };
        buffer.append(slice)?;
        Ok(buffer)
    }

    /// Push `slice` onto the newest edge, evicting from the oldest edge.
    pub fn append(&mut self, slice: &SpectralSlice) -> Result<()> {
        if slice.rows() != self.rows {
            return Err(SpectrogramError::RowMismatch {
                expected: self.rows,
                found: slice.rows(),
            });
        }

        // Columns that would be evicted within this same call are never written.
        let skip = slice.columns().saturating_sub(self.capacity);
        for col in skip..slice.columns() {
            self.push_column(slice.column(col));
        }
        self.total_columns += slice.columns() as u64;
        Ok(())
    }

    fn push_column(&mut self, column: &[f32]) {
        let slot = if self.len < self.capacity {
            let slot = (self.head + self.len) % self.capacity;
            self.len += 1;
            slot
        } else {
            let slot = self.head;
            self.head = (self.head + 1) % self.capacity;
            slot
        };
        let start = slot * self.rows;
        self.data[start..start + self.rows].copy_from_slice(column);
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot { buffer: self }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns currently held.
    pub fn columns(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every column ever appended, evicted or not.
    pub fn total_columns(&self) -> u64 {
        self.total_columns
    }

    fn slot_column(&self, col: usize) -> &[f32] {
        let slot = (self.head + col) % self.capacity;
        let start = slot * self.rows;
        &self.data[start..start + self.rows]
    }
}

/// Read-only view of a [`ScrollBuffer`], oldest column first.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    buffer: &'a ScrollBuffer,
}

impl<'a> Snapshot<'a> {
    pub fn rows(&self) -> usize {
        self.buffer.rows
    }

    pub fn columns(&self) -> usize {
        self.buffer.len
    }

    pub fn column(&self, col: usize) -> &'a [f32] {
        assert!(col < self.buffer.len, "column {col} out of range");
        self.buffer.slot_column(col)
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.column(col)[row]
    }

    pub fn columns_iter(&self) -> impl Iterator<Item = &'a [f32]> + use<'a> {
        let buffer = self.buffer;
        (0..buffer.len).map(move |col| buffer.slot_column(col))
    }

    /// Largest value in the view, 0.0 when empty.
    pub fn max_value(&self) -> f32 {
        self.columns_iter()
            .flat_map(|c| c.iter().copied())
            .fold(0.0, f32::max)
    }

    /// Copy into a plain `rows x columns` row-major matrix.
    pub fn to_row_major(&self) -> Vec<f32> {
        let (rows, cols) = (self.rows(), self.columns());
        let mut out = vec![0.0; rows * cols];
        for (c, column) in self.columns_iter().enumerate() {
            for (r, &v) in column.iter().enumerate() {
                out[r * cols + c] = v;
            }
        }
        out
    }
}
