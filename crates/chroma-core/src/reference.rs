//! White and black single-point references.
//!
//! Both are created by the calibration workflow and consumed by the
//! two-point and white-balance normalisation paths. They are cleared when a
//! session is cancelled or restarted.

use serde::{Deserialize, Serialize};

/// Averaged raw counts of a white reference surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WhiteCalibration {
    /// X count.
    pub x: u16,
    /// Y count.
    pub y: u16,
    /// Z count.
    pub z: u16,
    /// IR1 count.
    pub ir: u16,
    /// LED brightness used for the measurement.
    pub brightness: u8,
    /// Capture time in milliseconds since boot.
    pub timestamp_ms: u64,
    /// `true` once the reference passed validation.
    pub valid: bool,
    /// IR-compensated CIE white point derived from the counts.
    pub white_point: [f32; 3],
    /// Scale that maps the white point's largest component to Y = 50.
    pub scaling_factor: f32,
}

impl WhiteCalibration {
    /// Counts as `[X, Y, Z]`.
    #[inline]
    pub fn xyz(&self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }

    /// Mean of the three tristimulus counts.
    #[inline]
    pub fn avg_component(&self) -> f32 {
        (self.x as f32 + self.y as f32 + self.z as f32) / 3.0
    }

    /// Per-channel factors that make this reference read as a flat triplet.
    ///
    /// A zero channel gets a factor of 1.
    pub fn balance_factors(&self) -> [f32; 3] {
        let avg = self.avg_component();
        self.xyz()
            .map(|c| if c > 0.0 { avg / c } else { 1.0 })
    }
}

/// Averaged raw counts with the illumination off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlackCalibration {
    /// X count.
    pub x: u16,
    /// Y count.
    pub y: u16,
    /// Z count.
    pub z: u16,
    /// IR1 count.
    pub ir: u16,
    /// Capture time in milliseconds since boot.
    pub timestamp_ms: u64,
    /// `true` once the reference passed validation.
    pub valid: bool,
}

impl BlackCalibration {
    /// Counts as `[X, Y, Z]`.
    #[inline]
    pub fn xyz(&self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}
