//! Calibration matrices.
//!
//! A [`CalibrationMatrix`] wraps a row-major [`Mat4`] together with its
//! per-channel scale, provenance and a quality score. Two are held per
//! device, one per [`MatrixType`].
//!
//! The [`MatrixKind`] says what the matrix produces and which input it
//! expects:
//!
//! ```text
//! Tristimulus:  [R, G, B, IR] / 65535  ->  CIE XYZ       -> xyz_to_srgb
//! DisplayRgb:   [R, G, B, 1]  / 65535  ->  sRGB in [0,1] -> display_to_srgb
//! ```

use chroma_core::{adc, Error, RawChannelData, Result};
use chroma_math::Mat4;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::convert::{display_to_srgb, xyz_to_srgb};

/// Tolerance on the `[0, 0, 0, 1]` homogeneous row.
pub const HOMOGENEOUS_TOLERANCE: f32 = 0.001;

/// Quality score assigned to factory matrices.
pub const FACTORY_QUALITY: f32 = 85.0;

/// Factory low-IR matrix (LED / CFL illumination).
pub const FACTORY_LOW_IR: Mat4 = Mat4::from_rows([
    [0.5, 0.4, 0.2, -0.01],
    [0.25, 0.8, 0.1, -0.005],
    [0.02, 0.15, 1.2, -0.002],
    [0.0, 0.0, 0.0, 1.0],
]);

/// Factory high-IR matrix (incandescent illumination).
pub const FACTORY_HIGH_IR: Mat4 = Mat4::from_rows([
    [0.52, 0.38, 0.18, -0.02],
    [0.27, 0.78, 0.08, -0.01],
    [0.025, 0.12, 1.15, -0.005],
    [0.0, 0.0, 0.0, 1.0],
]);

/// Which illuminant regime a matrix is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixType {
    /// LED and fluorescent light.
    LowIr,
    /// Incandescent and daylight with strong IR content.
    HighIr,
}

impl MatrixType {
    /// Both types, low first.
    pub const ALL: [MatrixType; 2] = [MatrixType::LowIr, MatrixType::HighIr];

    /// Snake-case name, also used as a storage key prefix.
    pub const fn name(self) -> &'static str {
        match self {
            MatrixType::LowIr => "low_ir",
            MatrixType::HighIr => "high_ir",
        }
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a matrix maps raw channels to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatrixKind {
    /// CIE XYZ, converted to sRGB with the D65 matrix and gamma.
    #[default]
    Tristimulus,
    /// Gamma-encoded sRGB in `[0, 1]`, produced by a least-squares fit.
    /// The fourth input is the constant 1 (bias) rather than IR.
    DisplayRgb,
}

impl MatrixKind {
    /// Builds the normalised matrix input for a raw capture.
    ///
    /// `xyz` are the (possibly white/black corrected) tristimulus counts.
    pub fn input(self, xyz: [f32; 3], ir: f32) -> [f32; 4] {
        let fs = adc::FULL_SCALE as f32;
        let fourth = match self {
            MatrixKind::Tristimulus => ir / fs,
            MatrixKind::DisplayRgb => 1.0,
        };
        [xyz[0] / fs, xyz[1] / fs, xyz[2] / fs, fourth]
    }

    /// Quantises a matrix output of this kind to 8-bit sRGB.
    pub fn to_srgb(self, out: [f32; 3]) -> [u8; 3] {
        match self {
            MatrixKind::Tristimulus => xyz_to_srgb(out),
            MatrixKind::DisplayRgb => display_to_srgb(out),
        }
    }
}

/// Checks that every entry is finite.
///
/// A homogeneous row other than `[0, 0, 0, 1]` is logged but accepted.
pub fn validate_matrix(matrix: &Mat4) -> Result<()> {
    if !matrix.is_finite() {
        return Err(Error::invalid_matrix("matrix contains NaN or infinite values"));
    }
    let dev = matrix.homogeneous_deviation();
    if dev > HOMOGENEOUS_TOLERANCE {
        warn!(deviation = dev, "matrix homogeneous row is not [0,0,0,1]");
    }
    Ok(())
}

/// A 4x4 calibration matrix with scale factors and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMatrix {
    /// Row-major transform.
    pub matrix: Mat4,
    /// Independent output scale factors `[kX, kY, kZ]`.
    pub scale: [f32; 3],
    /// Output domain.
    pub kind: MatrixKind,
    /// `true` once populated from factory data, a fit or storage.
    pub valid: bool,
    /// Where the matrix came from.
    pub source: String,
    /// Creation time in milliseconds since boot.
    pub timestamp_ms: u64,
    /// 0 to 100.
    pub quality_score: f32,
}

impl Default for CalibrationMatrix {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            scale: [1.0; 3],
            kind: MatrixKind::Tristimulus,
            valid: false,
            source: String::from("none"),
            timestamp_ms: 0,
            quality_score: 0.0,
        }
    }
}

impl CalibrationMatrix {
    /// Creates a valid matrix with unity scale.
    pub fn new(matrix: Mat4, kind: MatrixKind, source: impl Into<String>) -> Self {
        Self {
            matrix,
            kind,
            valid: true,
            source: source.into(),
            ..Default::default()
        }
    }

    /// Factory matrix for the given illuminant regime.
    pub fn factory(ty: MatrixType) -> Self {
        let (matrix, source) = match ty {
            MatrixType::LowIr => (FACTORY_LOW_IR, "factory_low_ir"),
            MatrixType::HighIr => (FACTORY_HIGH_IR, "factory_high_ir"),
        };
        Self {
            quality_score: FACTORY_QUALITY,
            ..Self::new(matrix, MatrixKind::Tristimulus, source)
        }
    }

    /// Sets the scale factors.
    pub fn with_scale(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    /// Applies the matrix and scale to an already normalised input.
    pub fn apply(&self, input: [f32; 4]) -> Result<[f32; 3]> {
        let out = crate::convert::apply_color_matrix(input, &self.matrix)?;
        Ok([
            out[0] * self.scale[0],
            out[1] * self.scale[1],
            out[2] * self.scale[2],
        ])
    }

    /// Normalises a capture for this matrix's kind and applies it.
    pub fn apply_raw(&self, raw: &RawChannelData) -> Result<[f32; 3]> {
        let [r, g, b, ir] = raw.to_rgbi();
        self.apply(self.kind.input([r, g, b], ir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_factory_matrices() {
        let low = CalibrationMatrix::factory(MatrixType::LowIr);
        assert!(low.valid);
        assert_eq!(low.source, "factory_low_ir");
        assert_eq!(low.quality_score, 85.0);
        assert_eq!(low.scale, [1.0; 3]);
        assert_eq!(low.kind, MatrixKind::Tristimulus);
        assert!(validate_matrix(&low.matrix).is_ok());

        let high = CalibrationMatrix::factory(MatrixType::HighIr);
        assert_eq!(high.matrix.m[0][0], 0.52);
        assert_eq!(high.source, "factory_high_ir");
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut m = FACTORY_LOW_IR;
        m.m[2][1] = f32::INFINITY;
        let err = validate_matrix(&m).unwrap_err();
        assert!(matches!(err, Error::InvalidMatrix(_)));
    }

    #[test]
    fn test_validate_tolerates_odd_homogeneous_row() {
        let mut m = FACTORY_LOW_IR;
        m.m[3] = [0.1, 0.0, 0.0, 1.0];
        assert!(validate_matrix(&m).is_ok());
    }

    #[test]
    fn test_apply_scales_and_floors() {
        let m = CalibrationMatrix::new(Mat4::IDENTITY, MatrixKind::Tristimulus, "test")
            .with_scale([2.0, 1.0, 0.5]);
        let out = m.apply([0.25, -0.5, 0.5, 0.0]).unwrap();
        assert_eq!(out, [0.5, 0.0, 0.25]);
    }

    #[test]
    fn test_kind_input() {
        let t = MatrixKind::Tristimulus.input([65535.0, 0.0, 0.0], 65535.0);
        assert_abs_diff_eq!(t[0], 1.0);
        assert_abs_diff_eq!(t[3], 1.0);
        let d = MatrixKind::DisplayRgb.input([0.0, 0.0, 0.0], 30000.0);
        assert_eq!(d[3], 1.0);
    }

    #[test]
    fn test_matrix_type_names() {
        assert_eq!(MatrixType::LowIr.to_string(), "low_ir");
        assert_eq!(MatrixType::ALL[1], MatrixType::HighIr);
    }
}
