//! CIE 1931 helpers: chromaticity, colour temperature, IR compensation and
//! white-point normalisation.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// D65 white point, Y = 100.
pub const D65_WHITE_POINT: [f32; 3] = [95.047, 100.0, 108.883];

/// D65 chromaticity `(x, y)`.
pub const D65_CHROMATICITY: [f32; 2] = [0.31271, 0.32902];

/// Fraction of the IR count subtracted from each tristimulus channel.
pub const IR_COMPENSATION_FACTOR: f32 = 0.1;

/// Largest white-point component after scaling.
pub const WHITE_TARGET: f32 = 50.0;

/// CCT clamp range in kelvin.
pub const CCT_RANGE: (f32, f32) = (1000.0, 25000.0);

/// CIE xyY coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xyy {
    /// Chromaticity x.
    pub x: f32,
    /// Chromaticity y.
    pub y: f32,
    /// Luminance.
    pub big_y: f32,
}

/// XYZ to xyY. An all-zero input maps to the D65 chromaticity.
///
/// # Example
///
/// ```rust
/// use chroma_color::cie::xyz_to_xyy;
///
/// let c = xyz_to_xyy([0.0, 0.0, 0.0]);
/// assert_eq!((c.x, c.y, c.big_y), (0.31271, 0.32902, 0.0));
/// ```
pub fn xyz_to_xyy(xyz: [f32; 3]) -> Xyy {
    let sum = xyz[0] + xyz[1] + xyz[2];
    if sum > 0.0 {
        Xyy {
            x: xyz[0] / sum,
            y: xyz[1] / sum,
            big_y: xyz[1],
        }
    } else {
        Xyy {
            x: D65_CHROMATICITY[0],
            y: D65_CHROMATICITY[1],
            big_y: 0.0,
        }
    }
}

/// xyY to XYZ. `y <= 0` yields zeros.
pub fn xyy_to_xyz(c: Xyy) -> [f32; 3] {
    if c.y <= 0.0 {
        return [0.0; 3];
    }
    [
        c.x * c.big_y / c.y,
        c.big_y,
        (1.0 - c.x - c.y) * c.big_y / c.y,
    ]
}

/// Correlated colour temperature by McCamy's approximation.
///
/// Clamped to 1000..=25000 K.
pub fn correlated_color_temperature(x: f32, y: f32) -> f32 {
    let n = (x - 0.3320) / (0.1858 - y);
    let cct = 449.0 * n.powi(3) + 3525.0 * n.powi(2) + 6823.3 * n + 5520.33;
    if cct.is_nan() {
        return CCT_RANGE.0;
    }
    cct.clamp(CCT_RANGE.0, CCT_RANGE.1)
}

/// Subtracts `ir * 0.1` from each component, flooring at zero.
pub fn ir_compensate(xyz: [f32; 3], ir: f32) -> [f32; 3] {
    let c = ir * IR_COMPENSATION_FACTOR;
    xyz.map(|v| (v - c).max(0.0))
}

/// Measured white point of the illumination.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WhiteReference {
    /// IR-compensated white point in counts.
    pub white_point: [f32; 3],
    /// `50 / max(white_point)`, or 1 for a black white point.
    pub scaling_factor: f32,
    /// All components positive.
    pub valid: bool,
}

impl WhiteReference {
    /// Derives a white reference from raw white-tile counts.
    pub fn from_raw(xyz: [u16; 3], ir: u16) -> Self {
        let white_point = ir_compensate(xyz.map(f32::from), ir as f32);
        let max = white_point.iter().copied().fold(0.0, f32::max);
        let scaling_factor = if max > 0.0 { WHITE_TARGET / max } else { 1.0 };
        let valid = white_point.iter().all(|&v| v > 0.0);
        debug!(?white_point, scaling_factor, valid, "white reference");
        Self {
            white_point,
            scaling_factor,
            valid,
        }
    }

    /// Rescales `xyz` so this white point maps to D65.
    ///
    /// Returns the input unchanged when the reference is invalid.
    pub fn normalize(&self, xyz: [f32; 3]) -> [f32; 3] {
        normalize_to_white_point(xyz, self)
    }
}

/// Rescales `xyz` so the reference's white point maps to D65 (Y = 100).
pub fn normalize_to_white_point(xyz: [f32; 3], white: &WhiteReference) -> [f32; 3] {
    let w = white.white_point;
    if !white.valid || w.iter().any(|&v| v <= 0.0) {
        return xyz;
    }
    [
        xyz[0] / w[0] * D65_WHITE_POINT[0],
        xyz[1] / w[1] * D65_WHITE_POINT[1],
        xyz[2] / w[2] * D65_WHITE_POINT[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_xyy_roundtrip() {
        let xyz = [41.24, 21.26, 1.93];
        let back = xyy_to_xyz(xyz_to_xyy(xyz));
        for (a, b) in xyz.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_d65_cct() {
        let c = xyz_to_xyy(D65_WHITE_POINT);
        assert_abs_diff_eq!(c.x, 0.3127, epsilon = 1e-4);
        let cct = correlated_color_temperature(c.x, c.y);
        assert!((6400.0..6600.0).contains(&cct), "cct = {cct}");
    }

    #[test]
    fn test_cct_clamped() {
        assert_eq!(correlated_color_temperature(0.6, 0.2), 1000.0);
    }

    #[test]
    fn test_ir_compensation_floors() {
        assert_eq!(ir_compensate([100.0, 5.0, 50.0], 100.0), [90.0, 0.0, 40.0]);
    }

    #[test]
    fn test_white_reference() {
        let w = WhiteReference::from_raw([10100, 20100, 5100], 1000);
        assert_eq!(w.white_point, [10000.0, 20000.0, 5000.0]);
        assert_abs_diff_eq!(w.scaling_factor, 50.0 / 20000.0);
        assert!(w.valid);

        let n = w.normalize([10000.0, 20000.0, 5000.0]);
        assert_abs_diff_eq!(n[0], D65_WHITE_POINT[0], epsilon = 1e-3);
        assert_abs_diff_eq!(n[1], 100.0, epsilon = 1e-3);
        assert_abs_diff_eq!(n[2], D65_WHITE_POINT[2], epsilon = 1e-3);
    }

    #[test]
    fn test_dark_white_reference_invalid() {
        let w = WhiteReference::from_raw([50, 50, 50], 1000);
        assert!(!w.valid);
        assert_eq!(w.scaling_factor, 1.0);
        assert_eq!(w.normalize([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }
}
