//! Linear solvers for calibration fitting.
//!
//! [`LeastSquares`] accumulates the normal equations `AᵀA·x = Aᵀb` for an
//! affine fit with four regressors and three independent outputs, and
//! [`solve_linear`] solves each system by Gaussian elimination with partial
//! pivoting. Accumulation and elimination run in `f64`.

use chroma_core::{Error, Result};

/// Pivots smaller than this mark the system as singular.
pub const PIVOT_EPSILON: f64 = 1e-10;

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
///
/// # Errors
///
/// [`Error::SingularSystem`] if any pivot magnitude falls below
/// [`PIVOT_EPSILON`].
///
/// # Example
///
/// ```rust
/// use chroma_math::solve_linear;
///
/// let x = solve_linear([[2.0, 1.0], [1.0, 3.0]], [3.0, 5.0]).unwrap();
/// assert!((x[0] - 0.8).abs() < 1e-12);
/// assert!((x[1] - 1.4).abs() < 1e-12);
/// ```
pub fn solve_linear<const N: usize>(mut a: [[f64; N]; N], mut b: [f64; N]) -> Result<[f64; N]> {
    for col in 0..N {
        let pivot_row = (col..N)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);

        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return Err(Error::SingularSystem);
        }

        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..N {
            let factor = a[row][col] / a[col][col];
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; N];
    for row in (0..N).rev() {
        let tail: f64 = ((row + 1)..N).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// Normal-equation accumulator for `[x0, x1, x2, 1] -> [y0, y1, y2]` fits.
///
/// # Example
///
/// ```rust
/// use chroma_math::LeastSquares;
///
/// let mut ls = LeastSquares::new();
/// ls.add([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
/// ls.add([0.0, 1.0, 0.0], [0.0, 1.0, 0.0]);
/// ls.add([0.0, 0.0, 1.0], [0.0, 0.0, 1.0]);
/// ls.add([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
/// let rows = ls.solve().unwrap();
/// assert!((rows[0][0] - 1.0).abs() < 1e-5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LeastSquares {
    ata: [[f64; 4]; 4],
    atb: [[f64; 4]; 3],
    count: usize,
}

impl LeastSquares {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of observations added.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no observations were added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Adds one observation.
    pub fn add(&mut self, input: [f32; 3], target: [f32; 3]) {
        let row = [input[0] as f64, input[1] as f64, input[2] as f64, 1.0];
        for i in 0..4 {
            for j in 0..4 {
                self.ata[i][j] += row[i] * row[j];
            }
            for (ch, t) in target.iter().enumerate() {
                self.atb[ch][i] += row[i] * *t as f64;
            }
        }
        self.count += 1;
    }

    /// Solves each output channel independently.
    ///
    /// Returns one coefficient row `[c0, c1, c2, bias]` per output.
    pub fn solve(&self) -> Result<[[f32; 4]; 3]> {
        let mut rows = [[0.0f32; 4]; 3];
        for (ch, out) in rows.iter_mut().enumerate() {
            let x = solve_linear(self.ata, self.atb[ch])?;
            *out = x.map(|v| v as f32);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero in the leading position forces a row swap.
        let x = solve_linear([[0.0, 1.0], [1.0, 0.0]], [2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(x[0], 3.0);
        assert_abs_diff_eq!(x[1], 2.0);
    }

    #[test]
    fn test_singular_rejected() {
        let err = solve_linear([[1.0, 2.0], [2.0, 4.0]], [1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::SingularSystem));
    }

    #[test]
    fn test_recovers_affine_map() {
        let truth = [
            [0.8, 0.1, 0.05, 0.02],
            [0.1, 0.7, 0.1, 0.0],
            [0.0, 0.2, 0.9, -0.01],
        ];
        let inputs = [
            [0.1, 0.2, 0.3],
            [0.7, 0.1, 0.2],
            [0.2, 0.8, 0.1],
            [0.3, 0.3, 0.9],
            [0.5, 0.5, 0.5],
        ];
        let mut ls = LeastSquares::new();
        for i in inputs {
            let t = truth.map(|r| r[0] * i[0] + r[1] * i[1] + r[2] * i[2] + r[3]);
            ls.add(i, t);
        }
        assert_eq!(ls.len(), 5);
        let rows = ls.solve().unwrap();
        for (fit, want) in rows.iter().zip(truth.iter()) {
            for k in 0..4 {
                assert_abs_diff_eq!(fit[k], want[k], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_degenerate_points_singular() {
        let mut ls = LeastSquares::new();
        for _ in 0..5 {
            ls.add([0.5, 0.5, 0.5], [0.5, 0.5, 0.5]);
        }
        assert!(ls.solve().is_err());
    }
}
