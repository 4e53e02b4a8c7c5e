//! Matrix application and XYZ to sRGB conversion.
//!
//! # Pipeline
//!
//! ```text
//! [R, G, B, IR] --Mat4--> XYZ (floored at 0) --Mat3--> linear sRGB
//!     --clamp [0,1]--> OETF --x255, round--> [u8; 3]
//! ```

use chroma_core::{adc, Result};
use chroma_math::{Mat3, Mat4};
use chroma_transfer::srgb;

use crate::matrix::validate_matrix;

/// D65 XYZ to linear sRGB (IEC 61966-2-1).
pub const XYZ_TO_LINEAR_SRGB: Mat3 = Mat3::from_rows([
    [3.2406, -1.5372, -0.4986],
    [-0.9689, 1.8758, 0.0415],
    [0.0557, -0.2040, 1.0570],
]);

/// Applies a calibration matrix to an `[R, G, B, IR]` input.
///
/// The result is floored at zero: tristimulus values are never negative.
///
/// # Errors
///
/// [`InvalidMatrix`](chroma_core::Error::InvalidMatrix) if the matrix has
/// non-finite entries.
///
/// # Example
///
/// ```rust
/// use chroma_color::apply_color_matrix;
/// use chroma_math::Mat4;
///
/// let xyz = apply_color_matrix([0.2, -0.1, 0.4, 0.0], &Mat4::IDENTITY).unwrap();
/// assert_eq!(xyz, [0.2, 0.0, 0.4]);
/// ```
pub fn apply_color_matrix(input: [f32; 4], matrix: &Mat4) -> Result<[f32; 3]> {
    validate_matrix(matrix)?;
    let out = matrix.transform(input);
    Ok([out[0].max(0.0), out[1].max(0.0), out[2].max(0.0)])
}

/// XYZ to linear sRGB, unclamped.
#[inline]
pub fn xyz_to_linear_srgb(xyz: [f32; 3]) -> [f32; 3] {
    XYZ_TO_LINEAR_SRGB.apply(xyz)
}

/// XYZ (Y = 1 for white) to 8-bit gamma-encoded sRGB.
///
/// # Example
///
/// ```rust
/// use chroma_color::xyz_to_srgb;
///
/// assert_eq!(xyz_to_srgb([0.0, 0.0, 0.0]), [0, 0, 0]);
/// assert_eq!(xyz_to_srgb([0.9505, 1.0, 1.089]), [255, 255, 255]);
/// ```
pub fn xyz_to_srgb(xyz: [f32; 3]) -> [u8; 3] {
    xyz_to_linear_srgb(xyz).map(srgb::encode_u8)
}

/// Quantises already-encoded sRGB in `[0, 1]` to 8 bits, round-to-nearest.
#[inline]
pub fn display_to_srgb(rgb: [f32; 3]) -> [u8; 3] {
    rgb.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Uncalibrated per-channel mapping `raw * 255 / 65535` (integer division).
///
/// # Example
///
/// ```rust
/// use chroma_color::naive_srgb;
///
/// assert_eq!(naive_srgb([500, 500, 500]), [1, 1, 1]);
/// assert_eq!(naive_srgb([65535, 0, 32768]), [255, 0, 127]);
/// ```
pub fn naive_srgb(xyz: [u16; 3]) -> [u8; 3] {
    let fs = adc::FULL_SCALE as u32;
    xyz.map(|v| ((v as u32 * 255) / fs).min(255) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::Error;

    #[test]
    fn test_primaries() {
        // sRGB red primary in XYZ.
        let red = xyz_to_srgb([0.4124, 0.2126, 0.0193]);
        assert!(red[0] >= 254);
        assert!(red[1] <= 2);
        assert!(red[2] <= 2);
    }

    #[test]
    fn test_out_of_gamut_clamps() {
        assert_eq!(xyz_to_srgb([10.0, 10.0, 10.0]), [255, 255, 255]);
        assert_eq!(xyz_to_srgb([0.0, 1.0, 0.0])[0], 0);
    }

    #[test]
    fn test_display_rounding() {
        assert_eq!(display_to_srgb([0.5, 1.2, -0.1]), [128, 255, 0]);
        assert_eq!(display_to_srgb([200.0 / 255.0, 30.0 / 255.0, 40.0 / 255.0]), [200, 30, 40]);
    }

    #[test]
    fn test_invalid_matrix_rejected() {
        let mut m = Mat4::IDENTITY;
        m.m[0][0] = f32::NAN;
        let err = apply_color_matrix([1.0; 4], &m).unwrap_err();
        assert!(matches!(err, Error::InvalidMatrix(_)));
    }

    #[test]
    fn test_naive_fallback() {
        assert_eq!(naive_srgb([500, 500, 500]), [1, 1, 1]);
        assert_eq!(naive_srgb([65535; 3]), [255; 3]);
    }
}
