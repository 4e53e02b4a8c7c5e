//! 3x3 matrix for fixed colour-space transforms.
//!
//! Row-major storage, column vectors:
//!
//! ```text
//! | m00 m01 m02 |   | x |   | m00*x + m01*y + m02*z |
//! | m10 m11 m12 | * | y | = | m10*x + m11*y + m12*z |
//! | m20 m21 m22 |   | z |   | m20*x + m21*y + m22*z |
//! ```

/// A row-major 3x3 matrix.
///
/// # Example
///
/// ```rust
/// use chroma_math::Mat3;
///
/// let scale = Mat3::from_rows([[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.5]]);
/// assert_eq!(scale.apply([1.0, 1.0, 1.0]), [2.0, 1.0, 0.5]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    /// Rows.
    pub m: [[f32; 3]; 3],
}

impl Mat3 {
    /// Creates a matrix from row arrays.
    #[inline]
    pub const fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        Self { m: rows }
    }

    /// Multiplies a triplet.
    #[inline]
    pub fn apply(&self, v: [f32; 3]) -> [f32; 3] {
        self.m.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_row_major() {
        let m = Mat3::from_rows([[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 0.0, 1.0]]);
        assert_eq!(m.apply([1.0, 1.0, 1.0]), [1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_apply_mixes_columns() {
        let m = Mat3::from_rows([[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
        assert_eq!(m.apply([1.0, 2.0, 3.0]), [2.0, 3.0, 1.0]);
    }
}
