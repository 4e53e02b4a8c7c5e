//! Scalar interpolation helpers.

/// Linear interpolation between two values.
///
/// # Formula
///
/// `a + (b - a) * t`
///
/// # Example
///
/// ```rust
/// use chroma_math::lerp;
///
/// assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
/// ```
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Inverse linear interpolation.
///
/// Returns 0 when the range is degenerate.
///
/// # Example
///
/// ```rust
/// use chroma_math::inverse_lerp;
///
/// assert_eq!(inverse_lerp(0.0, 10.0, 5.0), 0.5);
/// assert_eq!(inverse_lerp(3.0, 3.0, 5.0), 0.0);
/// ```
#[inline]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() < 1e-10 {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// Clamps a value to [0, 1].
#[inline]
pub fn saturate(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Hermite smoothstep.
///
/// Returns 0 for `x <= edge0`, 1 for `x >= edge1`, and `3t² - 2t³` in between,
/// where `t = (x - edge0) / (edge1 - edge0)`. Both derivatives vanish at the
/// edges, so blends driven by it have no visible jump.
///
/// # Example
///
/// ```rust
/// use chroma_math::smoothstep;
///
/// assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
/// assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
/// assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
/// ```
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = saturate(inverse_lerp(edge0, edge1, x));
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.15, 0.35, 0.0), 0.0);
        assert_eq!(smoothstep(0.15, 0.35, 0.15), 0.0);
        assert_eq!(smoothstep(0.15, 0.35, 0.35), 1.0);
        assert_eq!(smoothstep(0.15, 0.35, 0.9), 1.0);
    }

    #[test]
    fn test_smoothstep_midpoint() {
        assert_abs_diff_eq!(smoothstep(0.15, 0.35, 0.25), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_smoothstep_monotonic() {
        let mut prev = 0.0;
        for i in 0..=100 {
            let v = smoothstep(0.15, 0.35, i as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_lerp_roundtrip() {
        let t = inverse_lerp(2.0, 6.0, 5.0);
        assert_abs_diff_eq!(lerp(2.0, 6.0, t), 5.0);
    }
}
