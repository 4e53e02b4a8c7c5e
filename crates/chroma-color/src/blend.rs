//! IR-ratio driven blending between the low-IR and high-IR matrices.
//!
//! The IR ratio `IR / (R + G + B + IR)` is mapped through a smoothstep
//! between two thresholds to a weight `w`:
//!
//! ```text
//!  w
//!  1 |                 ________
//!    |               /
//!    |             /
//!  0 |_________ /
//!    +---------+-------+--------> IR ratio
//!             low     high
//! ```
//!
//! and the result is `low * (1 - w) + high * w`.

use chroma_core::{Error, RawChannelData, Result};
use chroma_math::{lerp, smoothstep};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix::CalibrationMatrix;

/// Default lower IR-ratio threshold.
pub const DEFAULT_IR_LOW: f32 = 0.15;

/// Default upper IR-ratio threshold.
pub const DEFAULT_IR_HIGH: f32 = 0.35;

/// Normalised IR-ratio thresholds for the blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrThresholds {
    /// At or below this ratio only the low-IR matrix is used.
    pub low: f32,
    /// At or above this ratio only the high-IR matrix is used.
    pub high: f32,
}

impl Default for IrThresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_IR_LOW,
            high: DEFAULT_IR_HIGH,
        }
    }
}

impl IrThresholds {
    /// Creates thresholds, requiring `0 <= low < high <= 1`.
    pub fn new(low: f32, high: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
            return Err(Error::invalid_parameter(format!(
                "IR thresholds must satisfy 0 <= low < high <= 1, got {low} / {high}"
            )));
        }
        Ok(Self { low, high })
    }

    /// Blend weight for an IR ratio. 0 selects the low-IR matrix.
    #[inline]
    pub fn weight(&self, ratio: f32) -> f32 {
        smoothstep(self.low, self.high, ratio)
    }
}

/// `IR / (R + G + B + IR)` on raw counts, or 0 for an all-zero capture.
pub fn ir_ratio(raw: &RawChannelData) -> f32 {
    let total = raw.r as u32 + raw.g as u32 + raw.b as u32 + raw.ir as u32;
    if total == 0 {
        return 0.0;
    }
    raw.ir as f32 / total as f32
}

/// Applies both matrices to `input` and blends by the capture's IR ratio.
///
/// `input` is the normalised matrix input, `raw` supplies the IR ratio.
/// Both matrices must be valid.
pub fn apply_smooth_step_blending(
    input: [f32; 4],
    raw: &RawChannelData,
    low: &CalibrationMatrix,
    high: &CalibrationMatrix,
    thresholds: &IrThresholds,
) -> Result<[f32; 3]> {
    if !low.valid || !high.valid {
        return Err(Error::invalid_matrix("cannot blend: both matrices must be valid"));
    }

    let out_low = low.apply(input)?;
    let out_high = high.apply(input)?;

    let ratio = ir_ratio(raw);
    let w = thresholds.weight(ratio);
    debug!(ratio, weight = w, ?out_low, ?out_high, "IR blend");

    Ok([
        lerp(out_low[0], out_high[0], w),
        lerp(out_low[1], out_high[1], w),
        lerp(out_low[2], out_high[2], w),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixKind, MatrixType};
    use approx::assert_abs_diff_eq;
    use chroma_math::Mat4;

    fn raw(r: u16, g: u16, b: u16, ir: u16) -> RawChannelData {
        RawChannelData::new(r, g, b, ir)
    }

    #[test]
    fn test_thresholds_validation() {
        assert!(IrThresholds::new(0.1, 0.4).is_ok());
        assert!(IrThresholds::new(0.4, 0.4).is_err());
        assert!(IrThresholds::new(0.5, 0.2).is_err());
        assert!(IrThresholds::new(-0.1, 0.2).is_err());
        assert!(IrThresholds::new(0.1, 1.5).is_err());
    }

    #[test]
    fn test_ir_ratio() {
        assert_eq!(ir_ratio(&raw(0, 0, 0, 0)), 0.0);
        assert_abs_diff_eq!(ir_ratio(&raw(100, 100, 100, 100)), 0.25);
    }

    #[test]
    fn test_blend_endpoints() {
        let low = CalibrationMatrix::new(Mat4::IDENTITY, MatrixKind::Tristimulus, "a");
        let high = CalibrationMatrix::new(Mat4::IDENTITY, MatrixKind::Tristimulus, "b")
            .with_scale([2.0; 3]);
        let th = IrThresholds::default();
        let input = [0.1, 0.2, 0.3, 0.0];

        // 5% IR: pure low
        let out = apply_smooth_step_blending(input, &raw(1000, 1000, 1000, 158), &low, &high, &th)
            .unwrap();
        assert_abs_diff_eq!(out[2], 0.3, epsilon = 1e-6);

        // 50% IR: pure high
        let out = apply_smooth_step_blending(input, &raw(1000, 1000, 1000, 3000), &low, &high, &th)
            .unwrap();
        assert_abs_diff_eq!(out[2], 0.6, epsilon = 1e-6);

        // 25% IR: halfway
        let out = apply_smooth_step_blending(input, &raw(1000, 1000, 1000, 1000), &low, &high, &th)
            .unwrap();
        assert_abs_diff_eq!(out[2], 0.45, epsilon = 1e-4);
    }

    #[test]
    fn test_blend_requires_valid() {
        let low = CalibrationMatrix::factory(MatrixType::LowIr);
        let high = CalibrationMatrix::default();
        let err = apply_smooth_step_blending(
            [0.1; 4],
            &raw(10, 10, 10, 10),
            &low,
            &high,
            &IrThresholds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidMatrix(_)));
    }
}
