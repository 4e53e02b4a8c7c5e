//! White/black reference normalisation of raw tristimulus counts.
//!
//! With both references the counts are stretched linearly between black
//! and white:
//!
//! ```text
//! out = (raw - black) / (white - black) * avg(white)
//! ```
//!
//! With only a white reference each channel is scaled so the white reads
//! as a flat triplet. Outputs are clamped to the 16-bit range. Without a
//! white reference the counts pass through unchanged.

use chroma_core::{adc, BlackCalibration, RawChannelData, WhiteCalibration};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Which normalisation produced a scan's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMode {
    /// White and black references.
    TwoPoint,
    /// White reference only.
    WhiteBalance,
    /// No reference; naive mapping.
    Uncalibrated,
}

impl fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CalibrationMode::TwoPoint => "two-point",
            CalibrationMode::WhiteBalance => "white-balance",
            CalibrationMode::Uncalibrated => "uncalibrated",
        })
    }
}

fn clamp_counts(v: f32) -> f32 {
    v.clamp(0.0, adc::FULL_SCALE as f32)
}

/// Two-point (white + black) linear normalisation.
///
/// A channel whose white does not exceed its black is left untouched.
pub fn two_point(xyz: [f32; 3], white: &WhiteCalibration, black: &BlackCalibration) -> [f32; 3] {
    let avg = white.avg_component();
    let w = white.xyz();
    let k = black.xyz();
    let mut out = xyz;
    for i in 0..3 {
        let range = w[i] - k[i];
        if range > 0.0 {
            out[i] = clamp_counts((xyz[i] - k[i]) / range * avg);
        }
    }
    out
}

/// Single-point white balance.
pub fn white_balance(xyz: [f32; 3], white: &WhiteCalibration) -> [f32; 3] {
    let f = white.balance_factors();
    [
        clamp_counts(xyz[0] * f[0]),
        clamp_counts(xyz[1] * f[1]),
        clamp_counts(xyz[2] * f[2]),
    ]
}

/// Picks the normalisation the available references allow and applies it.
///
/// Invalid references are ignored.
pub fn prepare_channels(
    raw: &RawChannelData,
    white: &WhiteCalibration,
    black: &BlackCalibration,
) -> ([f32; 3], CalibrationMode) {
    let xyz = raw.xyz().map(f32::from);
    let (out, mode) = match (white.valid, black.valid) {
        (true, true) => (two_point(xyz, white, black), CalibrationMode::TwoPoint),
        (true, false) => (white_balance(xyz, white), CalibrationMode::WhiteBalance),
        _ => (xyz, CalibrationMode::Uncalibrated),
    };
    debug!(%mode, ?xyz, ?out, "channels normalised");
    (out, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn refs() -> (WhiteCalibration, BlackCalibration) {
        let white = WhiteCalibration {
            x: 50000,
            y: 52000,
            z: 48000,
            ir: 3000,
            valid: true,
            ..Default::default()
        };
        let black = BlackCalibration {
            x: 400,
            y: 450,
            z: 380,
            ir: 20,
            valid: true,
            ..Default::default()
        };
        (white, black)
    }

    #[test]
    fn test_two_point_identity_at_white() {
        let (white, black) = refs();
        let out = two_point(white.xyz(), &white, &black);
        for v in out {
            assert_abs_diff_eq!(v, 50000.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_two_point_zero_at_black() {
        let (white, black) = refs();
        let out = two_point(black.xyz(), &white, &black);
        for v in out {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_two_point_clamps_below_black() {
        let (white, black) = refs();
        assert_eq!(two_point([0.0; 3], &white, &black), [0.0; 3]);
    }

    #[test]
    fn test_white_balance_flattens_white() {
        let (white, _) = refs();
        let out = white_balance(white.xyz(), &white);
        for v in out {
            assert_abs_diff_eq!(v, 50000.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_mode_selection() {
        let (white, black) = refs();
        let raw = RawChannelData::new(500, 500, 500, 50);

        let (_, mode) = prepare_channels(&raw, &white, &black);
        assert_eq!(mode, CalibrationMode::TwoPoint);

        let (_, mode) = prepare_channels(&raw, &white, &BlackCalibration::default());
        assert_eq!(mode, CalibrationMode::WhiteBalance);

        let (out, mode) = prepare_channels(&raw, &WhiteCalibration::default(), &black);
        assert_eq!(mode, CalibrationMode::Uncalibrated);
        assert_eq!(out, [500.0; 3]);
    }
}
