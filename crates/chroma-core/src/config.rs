//! Sensor configuration: integration time, analog gain, LED level.
//!
//! Integration time uses the sensor's ATIME register encoding, where
//! `time_ms ≈ (atime + 1) * 2.78`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest integration time the controller will select.
pub const ATIME_MIN: u8 = 20;
/// Integration time used for indoor light.
pub const ATIME_MID: u8 = 100;
/// Longest integration time the controller will select.
pub const ATIME_MAX: u8 = 200;
/// Integration-time increment used by fine control.
pub const ATIME_STEP: u8 = 20;
/// Boot-time integration time.
pub const DEFAULT_ATIME: u8 = 150;

/// Dimmest LED level that still illuminates the target usefully.
pub const LED_MIN_BRIGHTNESS: u8 = 64;
/// Brightest LED level.
pub const LED_MAX_BRIGHTNESS: u8 = 255;
/// Boot-time LED level.
pub const DEFAULT_LED_BRIGHTNESS: u8 = 128;

/// Milliseconds per ATIME step.
const ATIME_STEP_MS: f32 = 2.78;

/// Analog gain setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Gain {
    /// 1x.
    X1,
    /// 4x.
    #[default]
    X4,
    /// 16x.
    X16,
    /// 64x.
    X64,
}

impl Gain {
    /// Decodes a register index (0..=3).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Gain::X1),
            1 => Some(Gain::X4),
            2 => Some(Gain::X16),
            3 => Some(Gain::X64),
            _ => None,
        }
    }

    /// Register index (0..=3).
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Multiplication factor.
    #[inline]
    pub fn multiplier(self) -> f32 {
        match self {
            Gain::X1 => 1.0,
            Gain::X4 => 4.0,
            Gain::X16 => 16.0,
            Gain::X64 => 64.0,
        }
    }

    /// Next lower gain, or `None` at 1x.
    #[inline]
    pub fn lower(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Next higher gain, or `None` at 64x.
    #[inline]
    pub fn higher(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier() as u32)
    }
}

/// Ambient brightness tier, classified from the Y channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightingCondition {
    /// Y below 1000.
    Dark,
    /// Y below 10000.
    #[default]
    Indoor,
    /// Y below 40000.
    Bright,
    /// Everything else.
    VeryBright,
}

impl LightingCondition {
    /// Upper Y bound (exclusive) for [`Dark`](Self::Dark).
    pub const DARK_BELOW: u16 = 1000;
    /// Upper Y bound (exclusive) for [`Indoor`](Self::Indoor).
    pub const INDOOR_BELOW: u16 = 10000;
    /// Upper Y bound (exclusive) for [`Bright`](Self::Bright).
    pub const BRIGHT_BELOW: u16 = 40000;

    /// Classifies a luminance count.
    pub fn classify(y: u16) -> Self {
        if y < Self::DARK_BELOW {
            LightingCondition::Dark
        } else if y < Self::INDOOR_BELOW {
            LightingCondition::Indoor
        } else if y < Self::BRIGHT_BELOW {
            LightingCondition::Bright
        } else {
            LightingCondition::VeryBright
        }
    }
}

impl fmt::Display for LightingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LightingCondition::Dark => "DARK",
            LightingCondition::Indoor => "INDOOR",
            LightingCondition::Bright => "BRIGHT",
            LightingCondition::VeryBright => "VERY_BRIGHT",
        };
        f.write_str(name)
    }
}

/// Current sensor state.
///
/// One live instance is owned by the dynamic sensor controller and mutated
/// only by its optimisation routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// ATIME register value.
    pub integration_time: u8,
    /// Analog gain.
    pub gain: Gain,
    /// Illumination LED level.
    pub led_brightness: u8,
    /// Tier this configuration was chosen for.
    pub lighting_condition: LightingCondition,
    /// `true` once the last optimisation pass found nothing to adjust.
    pub is_optimal: bool,
    /// Time of the last change, in milliseconds since boot.
    pub timestamp_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            integration_time: DEFAULT_ATIME,
            gain: Gain::X4,
            led_brightness: DEFAULT_LED_BRIGHTNESS,
            lighting_condition: LightingCondition::Indoor,
            is_optimal: false,
            timestamp_ms: 0,
        }
    }
}

impl SensorConfig {
    /// Creates a configuration for a lighting tier.
    pub const fn preset(
        integration_time: u8,
        gain: Gain,
        led_brightness: u8,
        lighting_condition: LightingCondition,
    ) -> Self {
        Self {
            integration_time,
            gain,
            led_brightness,
            lighting_condition,
            is_optimal: true,
            timestamp_ms: 0,
        }
    }

    /// Integration time in milliseconds.
    #[inline]
    pub fn integration_time_ms(&self) -> f32 {
        (self.integration_time as f32 + 1.0) * ATIME_STEP_MS
    }

    /// Checks the configuration against hardware limits.
    pub fn validate(&self) -> Result<()> {
        if self.integration_time < ATIME_MIN {
            return Err(Error::invalid_parameter(format!(
                "integration time {} below minimum {}",
                self.integration_time, ATIME_MIN
            )));
        }
        if self.led_brightness < LED_MIN_BRIGHTNESS {
            return Err(Error::invalid_parameter(format!(
                "LED brightness {} outside {}-{}",
                self.led_brightness, LED_MIN_BRIGHTNESS, LED_MAX_BRIGHTNESS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_steps() {
        assert_eq!(Gain::X1.lower(), None);
        assert_eq!(Gain::X4.lower(), Some(Gain::X1));
        assert_eq!(Gain::X16.higher(), Some(Gain::X64));
        assert_eq!(Gain::X64.higher(), None);
        assert_eq!(Gain::from_index(4), None);
        assert_eq!(Gain::X16.to_string(), "16x");
    }

    #[test]
    fn test_lighting_tiers() {
        assert_eq!(LightingCondition::classify(0), LightingCondition::Dark);
        assert_eq!(LightingCondition::classify(999), LightingCondition::Dark);
        assert_eq!(LightingCondition::classify(1000), LightingCondition::Indoor);
        assert_eq!(LightingCondition::classify(9999), LightingCondition::Indoor);
        assert_eq!(LightingCondition::classify(10000), LightingCondition::Bright);
        assert_eq!(LightingCondition::classify(40000), LightingCondition::VeryBright);
    }

    #[test]
    fn test_integration_time_ms() {
        let cfg = SensorConfig::default();
        assert_relative_eq!(cfg.integration_time_ms(), 151.0 * 2.78, epsilon = 1e-3);
    }

    #[test]
    fn test_validate() {
        assert!(SensorConfig::default().validate().is_ok());

        let short = SensorConfig {
            integration_time: 10,
            ..SensorConfig::default()
        };
        assert!(short.validate().is_err());

        let dim = SensorConfig {
            led_brightness: 10,
            ..SensorConfig::default()
        };
        assert!(dim.validate().is_err());
    }
}
