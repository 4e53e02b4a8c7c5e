//! sRGB transfer function.
//!
//! Piecewise: a linear segment near black and a 1/2.4 power law above.
//!
//! # Reference
//!
//! IEC 61966-2-1:1999

/// Linear-light breakpoint between the linear and power-law segments.
pub const LINEAR_BREAKPOINT: f32 = 0.0031308;

/// Encoded-value breakpoint (`LINEAR_BREAKPOINT * 12.92`).
pub const ENCODED_BREAKPOINT: f32 = 0.04045;

/// sRGB EOTF: decodes encoded [0, 1] to linear [0, 1].
///
/// # Formula
///
/// ```text
/// if V <= 0.04045:
///     L = V / 12.92
/// else:
///     L = ((V + 0.055) / 1.055)^2.4
/// ```
#[inline]
pub fn eotf(v: f32) -> f32 {
    if v <= ENCODED_BREAKPOINT {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB OETF: encodes linear [0, 1] to encoded [0, 1].
///
/// # Formula
///
/// ```text
/// if L <= 0.0031308:
///     V = L * 12.92
/// else:
///     V = 1.055 * L^(1/2.4) - 0.055
/// ```
#[inline]
pub fn oetf(l: f32) -> f32 {
    if l <= LINEAR_BREAKPOINT {
        l * 12.92
    } else {
        1.055 * l.powf(1.0 / 2.4) - 0.055
    }
}

/// Clamps a linear value to [0, 1], encodes it and quantises to 8 bits
/// with round-to-nearest.
///
/// # Example
///
/// ```rust
/// use chroma_transfer::srgb::encode_u8;
///
/// assert_eq!(encode_u8(-0.3), 0);
/// assert_eq!(encode_u8(0.2159), 128);
/// assert_eq!(encode_u8(4.0), 255);
/// ```
#[inline]
pub fn encode_u8(linear: f32) -> u8 {
    (oetf(linear.clamp(0.0, 1.0)) * 255.0 + 0.5) as u8
}

/// Decodes an 8-bit sRGB value to linear light.
#[inline]
pub fn decode_u8(v: u8) -> f32 {
    eotf(v as f32 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_roundtrip() {
        for i in 0..=1000 {
            let v = i as f32 / 1000.0;
            assert_abs_diff_eq!(oetf(eotf(v)), v, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_roundtrip_across_breakpoint() {
        for i in -50..=50 {
            let l = LINEAR_BREAKPOINT + i as f32 * 1e-5;
            assert_abs_diff_eq!(eotf(oetf(l)), l, epsilon = 1e-5);
            let v = ENCODED_BREAKPOINT + i as f32 * 1e-4;
            assert_abs_diff_eq!(oetf(eotf(v)), v, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(eotf(0.0), 0.0);
        assert_eq!(oetf(0.0), 0.0);
        assert_abs_diff_eq!(eotf(1.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(oetf(1.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_u8_roundtrip() {
        for v in 0..=255u8 {
            assert_eq!(encode_u8(decode_u8(v)), v);
        }
    }
}
