//! Sensor channels and raw channel captures.
//!
//! The TCS3430 exposes five 16-bit data channels. Three of them follow the
//! CIE 1931 tristimulus responses (X, Y, Z) and two observe infrared
//! leakage (IR1, IR2). Throughout the pipeline the tristimulus channels are
//! carried in `r`/`g`/`b` slots so that calibration matrices read naturally
//! as `[R, G, B, IR]` inputs:
//!
//! ```text
//! r  <- X   (CH3)
//! g  <- Y   (CH1)
//! b  <- Z   (CH0)
//! ir <- IR1 (CH2)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// ADC range constants shared by the reader, controller and quality engine.
pub mod adc {
    /// Full-scale 16-bit count.
    pub const FULL_SCALE: u16 = 65535;

    /// Counts at or above this value are treated as saturated.
    pub const SATURATION_THRESHOLD: u16 = 65000;

    /// 10% of full scale. Below this a reading is unusable.
    pub const SIGNAL_HARD_MIN: u16 = 6553;

    /// 20% of full scale. Below this a reading is weak.
    pub const SIGNAL_SOFT_MIN: u16 = 13107;

    /// 80% of full scale. Above this a reading is getting hot.
    pub const SIGNAL_SOFT_MAX: u16 = 52428;

    /// 90% of full scale. Above this a reading is near saturation.
    pub const SIGNAL_HARD_MAX: u16 = 58981;

    /// Status register: analog saturation (ASAT) flag.
    pub const STATUS_ASAT: u8 = 0x10;

    /// Status register: device error flag.
    pub const STATUS_ERROR: u8 = 0x80;
}

/// A physical data channel of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// CIE X response (register CH3).
    X,
    /// CIE Y (luminance) response (register CH1).
    Y,
    /// CIE Z response (register CH0).
    Z,
    /// First infrared channel (register CH2).
    Ir1,
    /// Second infrared channel (CH3 with the IR2 multiplexer enabled).
    Ir2,
}

impl Channel {
    /// All channels in transaction order.
    pub const ALL: [Channel; 5] = [Channel::X, Channel::Y, Channel::Z, Channel::Ir1, Channel::Ir2];

    /// Short display name.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Channel::X => "X",
            Channel::Y => "Y",
            Channel::Z => "Z",
            Channel::Ir1 => "IR1",
            Channel::Ir2 => "IR2",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One capture of the raw sensor channels.
///
/// Produced fresh on every read and never mutated afterwards. A capture
/// whose transport retries were exhausted is still returned, with
/// `valid == false`; callers must check validity instead of relying on an
/// error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawChannelData {
    /// X channel count.
    pub r: u16,
    /// Y channel count.
    pub g: u16,
    /// Z channel count.
    pub b: u16,
    /// IR1 channel count.
    pub ir: u16,
    /// IR2 channel count.
    pub ir2: u16,
    /// Capture time in milliseconds since boot.
    pub timestamp_ms: u64,
    /// `false` when the transport failed after all retries.
    pub valid: bool,
    /// `true` when any channel reached the saturation threshold or the
    /// device reported analog saturation.
    pub saturated: bool,
}

impl RawChannelData {
    /// Creates a valid capture from the tristimulus and IR1 counts.
    ///
    /// IR2 is set to the IR1 value and saturation is derived from the
    /// counts alone.
    pub fn new(r: u16, g: u16, b: u16, ir: u16) -> Self {
        let mut raw = Self {
            r,
            g,
            b,
            ir,
            ir2: ir,
            timestamp_ms: 0,
            valid: true,
            saturated: false,
        };
        raw.saturated = raw.exceeds(adc::SATURATION_THRESHOLD);
        raw
    }

    /// Creates an invalid capture stamped at `timestamp_ms`.
    #[inline]
    pub fn invalid(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    /// Returns the same capture with a new timestamp.
    #[inline]
    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Returns the count for a channel.
    #[inline]
    pub fn get(&self, channel: Channel) -> u16 {
        match channel {
            Channel::X => self.r,
            Channel::Y => self.g,
            Channel::Z => self.b,
            Channel::Ir1 => self.ir,
            Channel::Ir2 => self.ir2,
        }
    }

    /// Tristimulus counts as `[X, Y, Z]`.
    #[inline]
    pub fn xyz(&self) -> [u16; 3] {
        [self.r, self.g, self.b]
    }

    /// Matrix input as `[R, G, B, IR]` floats.
    #[inline]
    pub fn to_rgbi(&self) -> [f32; 4] {
        [self.r as f32, self.g as f32, self.b as f32, self.ir as f32]
    }

    /// Largest of the tristimulus channels.
    #[inline]
    pub fn max_visible(&self) -> u16 {
        self.r.max(self.g).max(self.b)
    }

    /// Smallest of the tristimulus channels.
    #[inline]
    pub fn min_visible(&self) -> u16 {
        self.r.min(self.g).min(self.b)
    }

    /// Returns `true` if any tristimulus or IR1 channel is at or above `threshold`.
    #[inline]
    pub fn exceeds(&self, threshold: u16) -> bool {
        self.r >= threshold || self.g >= threshold || self.b >= threshold || self.ir >= threshold
    }

    /// Returns `true` if every tristimulus channel reads zero.
    #[inline]
    pub fn is_dark(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}
