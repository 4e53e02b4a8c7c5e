//! Reference colour patches for matrix fitting.
//!
//! A [`ReferencePoint`] pairs a known sRGB colour with the sensor counts
//! measured on that patch. Points are collected one at a time, or a
//! built-in set is loaded and each patch measured afterwards.

use chroma_core::{Channel, RawChannelData};
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, CalibResult};

/// Maximum number of reference points held at once.
pub const MAX_REFERENCE_POINTS: usize = 12;

/// Fewest measured points a fit accepts.
pub const MIN_FIT_POINTS: usize = 4;

/// Point count below which a fit is accepted but logged as fragile.
pub const RECOMMENDED_FIT_POINTS: usize = 7;

/// Lowest usable count on a reference capture.
pub const REFERENCE_MIN_COUNT: u16 = 100;

/// Highest usable count on a reference capture.
pub const REFERENCE_MAX_COUNT: u16 = 60000;

/// 12-patch subset of the ColorChecker chart.
pub const COLOR_CHECKER: [([u8; 3], &str); 12] = [
    ([115, 82, 68], "Dark Skin"),
    ([194, 150, 130], "Light Skin"),
    ([98, 122, 157], "Blue Sky"),
    ([87, 108, 67], "Foliage"),
    ([133, 128, 177], "Blue Flower"),
    ([103, 189, 170], "Bluish Green"),
    ([214, 126, 44], "Orange"),
    ([80, 91, 166], "Purplish Blue"),
    ([193, 90, 99], "Moderate Red"),
    ([94, 60, 108], "Purple"),
    ([157, 188, 64], "Yellow Green"),
    ([224, 163, 46], "Orange Yellow"),
];

/// Primary paint references.
pub const PRIMARIES: [([u8; 3], &str); 7] = [
    ([255, 0, 0], "Red"),
    ([255, 255, 0], "Yellow"),
    ([0, 255, 0], "Green"),
    ([0, 255, 255], "Cyan"),
    ([0, 0, 255], "Blue"),
    ([255, 0, 255], "Magenta"),
    ([0, 0, 0], "Black"),
];

/// A reference colour and its measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Patch name.
    pub name: String,
    /// Known sRGB colour.
    pub reference: [u8; 3],
    /// Measured `[R, G, B, IR]` counts.
    pub sensor: [u16; 4],
    /// `true` once `sensor` holds a measurement.
    pub measured: bool,
    /// Delta-E of the last prediction for this patch.
    pub delta_e: f32,
}

impl ReferencePoint {
    /// An unmeasured patch.
    pub fn new(reference: [u8; 3], name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference,
            sensor: [0; 4],
            measured: false,
            delta_e: 0.0,
        }
    }

    /// Records a capture after checking its counts are usable.
    pub fn record(&mut self, raw: &RawChannelData) -> CalibResult<()> {
        check_capture(&self.name, raw)?;
        self.sensor = [raw.r, raw.g, raw.b, raw.ir];
        self.measured = true;
        self.delta_e = 0.0;
        Ok(())
    }

    /// Measured counts as a capture.
    pub fn capture(&self) -> RawChannelData {
        let [r, g, b, ir] = self.sensor;
        RawChannelData::new(r, g, b, ir)
    }
}

fn check_capture(name: &str, raw: &RawChannelData) -> CalibResult<()> {
    if !raw.valid {
        return Err(chroma_core::Error::SensorNotInitialized.into());
    }
    for ch in [Channel::X, Channel::Y, Channel::Z] {
        let value = raw.get(ch);
        if !(REFERENCE_MIN_COUNT..=REFERENCE_MAX_COUNT).contains(&value) {
            return Err(CalibError::ReferenceOutOfRange {
                name: name.to_string(),
                channel: ch,
                value,
                min: REFERENCE_MIN_COUNT,
                max: REFERENCE_MAX_COUNT,
            });
        }
    }
    Ok(())
}

/// Builds unmeasured points from a patch table.
pub fn patch_set(table: &[([u8; 3], &str)]) -> Vec<ReferencePoint> {
    table
        .iter()
        .take(MAX_REFERENCE_POINTS)
        .map(|(rgb, name)| ReferencePoint::new(*rgb, *name))
        .collect()
}
