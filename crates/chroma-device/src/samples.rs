//! Saved colour samples and the paint-match collaborator.
//!
//! Samples live in a fixed-capacity ring: once full, saving a new sample
//! drops the oldest one. Indices are always newest first.
//!
//! The ring is persisted as `sample_count` plus one JSON text entry per
//! sample (`sample_0` is the oldest).

use chroma_calib::{CalibError, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, DeviceResult};

/// Storage key of the sample count.
pub const SAMPLE_COUNT_KEY: &str = "sample_count";

fn sample_key(index: usize) -> String {
    format!("sample_{index}")
}

/// Name stored when no paint match is available.
pub const UNKNOWN_PAINT_NAME: &str = "Unknown";

/// Code stored when no paint match is available.
pub const UNKNOWN_PAINT_CODE: &str = "N/A";

/// A paint found for a colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintMatch {
    /// Paint name.
    pub name: String,
    /// Manufacturer code.
    pub code: String,
    /// Light reflectance value.
    pub lrv: f32,
}

impl Default for PaintMatch {
    fn default() -> Self {
        Self {
            name: UNKNOWN_PAINT_NAME.to_string(),
            code: UNKNOWN_PAINT_CODE.to_string(),
            lrv: 0.0,
        }
    }
}

/// Looks up the closest paint for an sRGB colour.
///
/// Implementations typically call a remote service. `Ok(None)` means the
/// service answered without a match.
pub trait PaintMatcher {
    /// Finds the best match for `rgb`.
    fn find_match(&mut self, rgb: [u8; 3]) -> DeviceResult<Option<PaintMatch>>;
}

/// A stored measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    /// Measured colour.
    pub rgb: [u8; 3],
    /// Matched paint, or the unknown defaults.
    pub paint: PaintMatch,
    /// Capture time in milliseconds since boot.
    pub timestamp_ms: u64,
}

impl ColorSample {
    /// `#rrggbb` form of the colour.
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Bounded sample history.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    entries: VecDeque<ColorSample>,
    capacity: usize,
}

impl SampleBuffer {
    /// Creates an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a sample, dropping the oldest when full.
    pub fn push(&mut self, sample: ColorSample) {
        if self.entries.len() == self.capacity {
            if let Some(old) = self.entries.pop_front() {
                debug!(rgb = ?old.rgb, "oldest sample overwritten");
            }
        }
        self.entries.push_back(sample);
    }

    /// Sample at `index`, newest first.
    pub fn get(&self, index: usize) -> Option<&ColorSample> {
        let len = self.entries.len();
        if index >= len {
            return None;
        }
        self.entries.get(len - 1 - index)
    }

    /// All samples, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ColorSample> {
        self.entries.iter().rev()
    }

    /// Removes the sample at `index`, newest first.
    pub fn remove(&mut self, index: usize) -> DeviceResult<ColorSample> {
        let count = self.entries.len();
        if index >= count {
            return Err(DeviceError::NoSuchSample { index, count });
        }
        self.entries
            .remove(count - 1 - index)
            .ok_or(DeviceError::NoSuchSample { index, count })
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes the ring to `kv`, removing entries beyond the current count.
    pub fn save(&self, kv: &mut dyn KeyValueStore) -> DeviceResult<()> {
        for (i, sample) in self.entries.iter().enumerate() {
            let json = serde_json::to_string(sample).map_err(CalibError::from)?;
            kv.put_text(&sample_key(i), &json)?;
        }
        for i in self.entries.len()..self.capacity {
            kv.remove(&sample_key(i))?;
        }
        kv.put_u64(SAMPLE_COUNT_KEY, self.entries.len() as u64)?;
        debug!(count = self.entries.len(), "samples saved");
        Ok(())
    }

    /// Reads a ring written by [`save`](Self::save).
    ///
    /// Unreadable entries are skipped; a stored ring larger than
    /// `capacity` keeps its newest samples.
    pub fn load(kv: &dyn KeyValueStore, capacity: usize) -> Self {
        let mut buf = Self::new(capacity);
        let count = usize::try_from(kv.get_u64(SAMPLE_COUNT_KEY, 0)).unwrap_or(0);
        for i in 0..count {
            let Some(text) = kv.get_text(&sample_key(i)) else {
                warn!(index = i, "stored sample missing");
                continue;
            };
            match serde_json::from_str::<ColorSample>(&text) {
                Ok(sample) => buf.push(sample),
                Err(e) => warn!(index = i, error = %e, "stored sample unreadable"),
            }
        }
        if !buf.is_empty() {
            info!(count = buf.len(), "samples restored");
        }
        buf
    }
}

/// Asks the matcher for a paint, falling back to the unknown defaults.
pub fn lookup_paint(matcher: &mut Option<Box<dyn PaintMatcher>>, rgb: [u8; 3]) -> PaintMatch {
    let Some(matcher) = matcher.as_mut() else {
        return PaintMatch::default();
    };
    match matcher.find_match(rgb) {
        Ok(Some(paint)) => paint,
        Ok(None) => PaintMatch::default(),
        Err(e) => {
            warn!(error = %e, ?rgb, "paint match unavailable, saving without match");
            PaintMatch::default()
        }
    }
}
