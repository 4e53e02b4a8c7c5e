//! Scan results.

use chroma_color::{CalibrationMode, Xyy};
use chroma_core::RawChannelData;
use chroma_sensor::ReadingQuality;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single colour measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Measured colour.
    pub rgb: [u8; 3],
    /// Averaged channel counts.
    pub raw: RawChannelData,
    /// X/Y/Z after white/black correction.
    pub calibrated: [f32; 3],
    /// Correction applied to the channels.
    pub mode: CalibrationMode,
    /// Quality of the averaged burst.
    pub quality: ReadingQuality,
    /// LED brightness used.
    pub brightness: u8,
    /// Chromaticity of the corrected channels.
    pub xyy: Xyy,
    /// Correlated colour temperature in kelvin.
    pub cct: f32,
}

impl ScanResult {
    /// `#rrggbb` form of the colour.
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Stability class of a continuous scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Consistency {
    /// Largest variation below 10%.
    Excellent,
    /// Largest variation below 20%.
    Good,
    /// Anything noisier.
    Moderate,
}

impl Consistency {
    /// Classifies a peak-to-peak variation in percent.
    ///
    /// ```rust
    /// use chroma_device::Consistency;
    ///
    /// assert_eq!(Consistency::from_variation(9.9), Consistency::Excellent);
    /// assert_eq!(Consistency::from_variation(10.0), Consistency::Good);
    /// assert_eq!(Consistency::from_variation(25.0), Consistency::Moderate);
    /// ```
    pub fn from_variation(percent: f32) -> Self {
        if percent < 10.0 {
            Self::Excellent
        } else if percent < 20.0 {
            Self::Good
        } else {
            Self::Moderate
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Moderate => "moderate",
        };
        f.write_str(s)
    }
}

/// Per-channel spread of a reading series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelSpread {
    /// Mean count.
    pub mean: f32,
    /// Smallest count.
    pub min: u16,
    /// Largest count.
    pub max: u16,
    /// `(max - min) / mean` in percent, 0 for a zero mean.
    pub variation_pct: f32,
}

impl ChannelSpread {
    /// Spread of one channel. An empty series yields zeros.
    pub fn from_counts(counts: impl IntoIterator<Item = u16>) -> Self {
        let mut n = 0u32;
        let mut sum = 0u64;
        let mut min = u16::MAX;
        let mut max = 0;
        for c in counts {
            n += 1;
            sum += c as u64;
            min = min.min(c);
            max = max.max(c);
        }
        if n == 0 {
            return Self::default();
        }
        let mean = sum as f32 / n as f32;
        let variation_pct = if mean > 0.0 {
            (max - min) as f32 / mean * 100.0
        } else {
            0.0
        };
        Self {
            mean,
            min,
            max,
            variation_pct,
        }
    }
}

/// Outcome of a continuous scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousScan {
    /// Valid readings collected.
    pub readings: usize,
    /// Time spent reading.
    pub duration_ms: u64,
    /// Spread for X, Y, Z and IR.
    pub channels: [ChannelSpread; 4],
    /// Largest X/Y/Z variation in percent.
    pub max_variation_pct: f32,
    /// Stability class.
    pub consistency: Consistency,
    /// Colour of the mean reading.
    pub rgb: [u8; 3],
    /// Correction applied to the mean reading.
    pub mode: CalibrationMode,
}

impl ContinuousScan {
    /// Summarises a reading series.
    pub(crate) fn summarize(samples: &[RawChannelData]) -> ([ChannelSpread; 4], f32) {
        let channels = [
            ChannelSpread::from_counts(samples.iter().map(|s| s.r)),
            ChannelSpread::from_counts(samples.iter().map(|s| s.g)),
            ChannelSpread::from_counts(samples.iter().map(|s| s.b)),
            ChannelSpread::from_counts(samples.iter().map(|s| s.ir)),
        ];
        let max_variation_pct = channels[..3]
            .iter()
            .map(|c| c.variation_pct)
            .fold(0.0, f32::max);
        (channels, max_variation_pct)
    }

    /// Mean reading as a capture.
    pub fn mean_capture(&self) -> RawChannelData {
        let [x, y, z, ir] = self.channels.map(|c| c.mean.round() as u16);
        RawChannelData::new(x, y, z, ir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spread() {
        let s = ChannelSpread::from_counts([900u16, 1000, 1100]);
        assert_relative_eq!(s.mean, 1000.0);
        assert_eq!((s.min, s.max), (900, 1100));
        assert_relative_eq!(s.variation_pct, 20.0);

        assert_eq!(ChannelSpread::from_counts(std::iter::empty()), ChannelSpread::default());
        assert_eq!(ChannelSpread::from_counts([0u16, 0]).variation_pct, 0.0);
    }

    #[test]
    fn test_summary_ignores_ir() {
        let samples = [
            RawChannelData::new(1000, 1000, 1000, 10),
            RawChannelData::new(1050, 1000, 1000, 90),
        ];
        let (channels, peak) = ContinuousScan::summarize(&samples);
        assert!(channels[3].variation_pct > 100.0);
        assert_relative_eq!(peak, 50.0 / 1025.0 * 100.0, epsilon = 1e-4);
        assert_eq!(Consistency::from_variation(peak), Consistency::Excellent);
    }
}
