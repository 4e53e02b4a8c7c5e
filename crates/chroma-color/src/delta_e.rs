//! Colour difference metrics.
//!
//! Two variants are provided:
//!
//! - [`DeltaEMethod::Rgb`] - Euclidean distance in 8-bit sRGB. Fast, used
//!   for live feedback while collecting reference patches.
//! - [`DeltaEMethod::Lab`] - CIE76: Euclidean distance in CIE L\*a\*b\*
//!   under D65. Used for calibration quality scoring.

use chroma_transfer::srgb;
use serde::{Deserialize, Serialize};

/// D65 reference white, Y normalised to 1.
pub const D65_WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

/// LAB linear-segment threshold, `(6/29)^3`.
pub const LAB_EPSILON: f32 = 0.008856;

/// Delta-E below this is visually indistinguishable.
pub const EXCELLENT_DELTA_E: f32 = 2.0;

/// Delta-E below this is acceptable for paint matching.
pub const ACCEPTABLE_DELTA_E: f32 = 5.0;

/// Which colour difference formula to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeltaEMethod {
    /// Euclidean sRGB distance.
    Rgb,
    /// CIE76 in L\*a\*b\*.
    #[default]
    Lab,
}

/// Euclidean distance between two 8-bit sRGB triplets.
///
/// # Example
///
/// ```rust
/// use chroma_color::delta_e_rgb;
///
/// assert_eq!(delta_e_rgb([10, 20, 30], [13, 24, 30]), 5.0);
/// ```
pub fn delta_e_rgb(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// 8-bit sRGB to CIE L\*a\*b\* (D65).
pub fn srgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(srgb::decode_u8);

    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;

    let f = |t: f32| {
        if t > LAB_EPSILON {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };

    let fx = f(x / D65_WHITE[0]);
    let fy = f(y / D65_WHITE[1]);
    let fz = f(z / D65_WHITE[2]);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIE76 difference between two 8-bit sRGB triplets.
pub fn delta_e_lab(a: [u8; 3], b: [u8; 3]) -> f32 {
    let la = srgb_to_lab(a);
    let lb = srgb_to_lab(b);
    la.iter()
        .zip(lb.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f32>()
        .sqrt()
}

/// Colour difference using the chosen method.
#[inline]
pub fn delta_e(a: [u8; 3], b: [u8; 3], method: DeltaEMethod) -> f32 {
    match method {
        DeltaEMethod::Rgb => delta_e_rgb(a, b),
        DeltaEMethod::Lab => delta_e_lab(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lab_white_and_black() {
        let white = srgb_to_lab([255, 255, 255]);
        assert_abs_diff_eq!(white[0], 100.0, epsilon = 0.01);
        assert_abs_diff_eq!(white[1], 0.0, epsilon = 0.05);
        assert_abs_diff_eq!(white[2], 0.0, epsilon = 0.05);

        let black = srgb_to_lab([0, 0, 0]);
        assert_abs_diff_eq!(black[0], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_lab_red() {
        let red = srgb_to_lab([255, 0, 0]);
        assert_abs_diff_eq!(red[0], 53.24, epsilon = 0.05);
        assert_abs_diff_eq!(red[1], 80.09, epsilon = 0.1);
        assert_abs_diff_eq!(red[2], 67.20, epsilon = 0.1);
    }

    #[test]
    fn test_identical_is_zero() {
        let c = [120, 45, 200];
        assert_eq!(delta_e(c, c, DeltaEMethod::Rgb), 0.0);
        assert_eq!(delta_e(c, c, DeltaEMethod::Lab), 0.0);
    }

    #[test]
    fn test_lab_is_symmetric() {
        let a = [200, 30, 40];
        let b = [190, 45, 60];
        assert_abs_diff_eq!(delta_e_lab(a, b), delta_e_lab(b, a));
        assert!(delta_e_lab(a, b) > EXCELLENT_DELTA_E);
    }
}
