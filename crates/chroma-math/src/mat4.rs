//! 4x4 matrix type for sensor calibration.
//!
//! A calibration matrix maps the sensor input `[R, G, B, IR]` to
//! `[X, Y, Z, 1]`. By convention the last row is `[0, 0, 0, 1]`; the fourth
//! column carries the IR weight (or the bias term for fitted matrices).
//!
//! # Usage
//!
//! ```rust
//! use chroma_math::Mat4;
//!
//! let m = Mat4::from_rows([
//!     [0.5, 0.4, 0.2, -0.01],
//!     [0.25, 0.8, 0.1, -0.005],
//!     [0.02, 0.15, 1.2, -0.002],
//!     [0.0, 0.0, 0.0, 1.0],
//! ]);
//! assert!(m.is_finite());
//! assert_eq!(m.homogeneous_deviation(), 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// Number of elements in a [`Mat4`].
pub const MAT4_LEN: usize = 16;

/// Size of a [`Mat4`] serialised with [`Mat4::to_bytes`].
pub const MAT4_BYTES: usize = MAT4_LEN * 4;

/// A row-major 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat4 {
    /// Matrix elements in row-major order.
    pub m: [[f32; 4]; 4],
}

impl Mat4 {
    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Expected homogeneous row.
    pub const HOMOGENEOUS_ROW: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

    /// Creates a matrix from row arrays.
    #[inline]
    pub const fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { m: rows }
    }

    /// Creates a matrix from 16 row-major values.
    pub fn from_flat(values: [f32; MAT4_LEN]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, v) in values.into_iter().enumerate() {
            m[i / 4][i % 4] = v;
        }
        Self { m }
    }

    /// Returns the 16 values in row-major order.
    pub fn to_flat(&self) -> [f32; MAT4_LEN] {
        let mut out = [0.0; MAT4_LEN];
        for (i, v) in self.m.iter().flatten().enumerate() {
            out[i] = *v;
        }
        out
    }

    /// Transforms an `[R, G, B, IR]` input.
    #[inline]
    pub fn transform(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (row, o) in self.m.iter().zip(out.iter_mut()) {
            *o = row[0] * v[0] + row[1] * v[1] + row[2] * v[2] + row[3] * v[3];
        }
        out
    }

    /// Returns true if all elements are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|x| x.is_finite())
    }

    /// Largest absolute difference between the last row and `[0, 0, 0, 1]`.
    pub fn homogeneous_deviation(&self) -> f32 {
        self.m[3]
            .iter()
            .zip(Self::HOMOGENEOUS_ROW)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    /// Serialises to 64 little-endian bytes, row-major.
    ///
    /// Bit patterns are preserved exactly, so a save/load cycle is lossless.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_flat().iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Parses the output of [`to_bytes`](Self::to_bytes).
    ///
    /// Returns `None` unless `bytes` is exactly 64 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MAT4_BYTES {
            return None;
        }
        let mut values = [0.0; MAT4_LEN];
        for (v, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
            *v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(Self::from_flat(values))
    }
}
