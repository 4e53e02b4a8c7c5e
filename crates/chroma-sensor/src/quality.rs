//! Multi-sample reading quality.
//!
//! A quality reading takes a burst of rapid samples, averages them and
//! scores their consistency. The score starts at 100 and loses points for:
//!
//! | Condition | Penalty |
//! |-----------|---------|
//! | CV > 15% / > 7.5% | -30 / -15 |
//! | max > 90% / > 80% of full scale | -25 / -10 |
//! | min < 10% / < 20% of full scale | -25 / -10 |
//! | outliers > 25% of samples / any | -20 / -5 |
//!
//! Retrying on a poor score is the caller's decision.

use chroma_core::{adc, Error, RawChannelData, Result};
use chroma_math::{SampleStats, OUTLIER_SIGMA};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::reader::RawChannelReader;

/// CV above which consistency is poor.
pub const MAX_COEFFICIENT_OF_VARIATION: f32 = 0.15;

/// Burst parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Samples per burst.
    pub samples: usize,
    /// Delay between samples.
    pub interval_ms: u64,
    /// Outlier threshold in standard deviations.
    pub outlier_sigma: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            interval_ms: 50,
            outlier_sigma: OUTLIER_SIGMA,
        }
    }
}

/// Score tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLevel {
    /// Below 50.
    Poor,
    /// 50 and up.
    Fair,
    /// 70 and up.
    Good,
    /// 90 and up.
    Excellent,
}

impl QualityLevel {
    /// Classifies a 0..=100 score.
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => QualityLevel::Excellent,
            70..=89 => QualityLevel::Good,
            50..=69 => QualityLevel::Fair,
            _ => QualityLevel::Poor,
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
        })
    }
}

/// Quality summary of one burst.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadingQuality {
    /// Largest CV over X, Y and Z.
    pub coefficient_of_variation: f32,
    /// Averaged maximum above 90% of full scale, or device saturation.
    pub has_saturation: bool,
    /// Averaged minimum below 10% of full scale.
    pub has_low_signal: bool,
    /// 0..=100.
    pub quality_score: u8,
    /// Smallest averaged tristimulus channel.
    pub min_reading: u16,
    /// Largest averaged tristimulus channel.
    pub max_reading: u16,
}

impl ReadingQuality {
    /// Score tier.
    pub fn level(&self) -> QualityLevel {
        QualityLevel::from_score(self.quality_score)
    }

    /// `true` at fair quality or better.
    pub fn is_acceptable(&self) -> bool {
        self.level() >= QualityLevel::Fair
    }
}

/// Averaged capture with its quality and per-channel statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReading {
    /// Channel means.
    pub raw: RawChannelData,
    /// Quality summary.
    pub quality: ReadingQuality,
    /// Statistics for X, Y and Z.
    pub stats: [SampleStats; 3],
}

/// Scores and averages sample bursts.
#[derive(Debug, Clone, Default)]
pub struct QualityEngine {
    config: QualityConfig,
}

impl QualityEngine {
    /// Creates an engine.
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Burst parameters.
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Statistics with the configured outlier threshold.
    pub fn compute_statistics(&self, samples: &[u16]) -> SampleStats {
        SampleStats::from_counts(samples, self.config.outlier_sigma)
    }

    /// Scores one channel's samples.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chroma_sensor::QualityEngine;
    ///
    /// let engine = QualityEngine::default();
    /// assert_eq!(engine.score_quality(&[30000; 10]), 100);
    /// assert_eq!(engine.score_quality(&[65000; 10]), 75);
    /// ```
    pub fn score_quality(&self, samples: &[u16]) -> u8 {
        let s = self.compute_statistics(samples);
        let mut score: i32 = 100;

        if s.coefficient_of_variation > MAX_COEFFICIENT_OF_VARIATION {
            score -= 30;
        } else if s.coefficient_of_variation > MAX_COEFFICIENT_OF_VARIATION / 2.0 {
            score -= 15;
        }

        if s.max > adc::SIGNAL_HARD_MAX as f32 {
            score -= 25;
        } else if s.max > adc::SIGNAL_SOFT_MAX as f32 {
            score -= 10;
        }

        if s.min < adc::SIGNAL_HARD_MIN as f32 {
            score -= 25;
        } else if s.min < adc::SIGNAL_SOFT_MIN as f32 {
            score -= 10;
        }

        if s.outlier_count > samples.len() / 4 {
            score -= 20;
        } else if s.outlier_count > 0 {
            score -= 5;
        }

        score.max(0) as u8
    }

    /// Takes a burst, averages it and scores it.
    ///
    /// X, Y and Z are averaged through their statistics; IR1 and IR2 by
    /// integer mean. The score is computed on the Y channel.
    pub fn perform_quality_reading(&self, reader: &mut RawChannelReader) -> Result<QualityReading> {
        let n = self.config.samples;
        if n == 0 {
            return Err(Error::invalid_parameter("quality burst needs at least one sample"));
        }

        let mut channels: [Vec<u16>; 5] = Default::default();
        for ch in channels.iter_mut() {
            ch.reserve(n);
        }

        for i in 0..n {
            if i > 0 {
                reader.delay_ms(self.config.interval_ms);
            }
            let s = reader.try_read()?;
            for (buf, v) in channels.iter_mut().zip([s.r, s.g, s.b, s.ir, s.ir2]) {
                buf.push(v);
            }
        }

        let stats = [
            self.compute_statistics(&channels[0]),
            self.compute_statistics(&channels[1]),
            self.compute_statistics(&channels[2]),
        ];
        let [x, y, z] = stats.map(|s| s.mean as u16);
        let mean = |v: &[u16]| (v.iter().map(|&c| c as u32).sum::<u32>() / v.len() as u32) as u16;
        let ir1 = mean(&channels[3]);
        let ir2 = mean(&channels[4]);

        let mut raw = RawChannelData::new(x, y, z, ir1).at(reader.now_ms());
        raw.ir2 = ir2;

        let max_reading = raw.max_visible();
        let min_reading = raw.min_visible();
        let has_saturation = max_reading > adc::SIGNAL_HARD_MAX || reader.analog_saturation();
        raw.saturated = raw.saturated || has_saturation;

        let quality = ReadingQuality {
            coefficient_of_variation: stats
                .iter()
                .map(|s| s.coefficient_of_variation)
                .fold(0.0, f32::max),
            has_saturation,
            has_low_signal: min_reading < adc::SIGNAL_HARD_MIN,
            quality_score: self.score_quality(&channels[1]),
            min_reading,
            max_reading,
        };

        debug!(?stats, "quality statistics");
        info!(
            x, y, z, ir1, ir2,
            cv = quality.coefficient_of_variation,
            score = quality.quality_score,
            "quality reading complete"
        );

        Ok(QualityReading { raw, quality, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SceneState, SimRig};
    use crate::hal::Clock;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_identical_samples_score_100() {
        let engine = QualityEngine::default();
        assert_eq!(engine.score_quality(&[30000; 10]), 100);
    }

    #[test]
    fn test_signal_penalties() {
        let engine = QualityEngine::default();
        assert_eq!(engine.score_quality(&[55000; 10]), 90);
        assert_eq!(engine.score_quality(&[10000; 10]), 90);
        assert_eq!(engine.score_quality(&[3000; 10]), 75);
    }

    #[test]
    fn test_inconsistent_samples() {
        let engine = QualityEngine::default();
        // one spike in ten: CV ~ 0.3, one outlier
        let mut samples = [20000u16; 10];
        samples[4] = 40000;
        let stats = engine.compute_statistics(&samples);
        assert_relative_eq!(stats.mean, 22000.0);
        assert_relative_eq!(stats.std_dev, 6000.0, max_relative = 1e-4);
        assert_relative_eq!(stats.coefficient_of_variation, 3.0 / 11.0, max_relative = 1e-4);
        assert_eq!(stats.outlier_count, 1);
        assert_eq!(engine.score_quality(&samples), 100 - 30 - 5);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let engine = QualityEngine::default();
        let samples = [100, 65535, 100, 65535, 200, 65535, 100, 65535, 100, 65535];
        assert!(engine.score_quality(&samples) <= 20);
    }

    #[test]
    fn test_levels() {
        assert_eq!(QualityLevel::from_score(100), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(75), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(50), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(49), QualityLevel::Poor);
        let q = ReadingQuality { quality_score: 49, ..Default::default() };
        assert!(!q.is_acceptable());
    }

    #[test]
    fn test_quality_reading_averages() {
        let rig = SimRig::new(SceneState {
            ambient: [30000.0, 32000.0, 28000.0, 2000.0],
            noise: 100.0,
            ..SceneState::dark()
        });
        let mut reader = rig.reader();
        let engine = QualityEngine::default();
        let start = rig.clock().now_ms();
        let r = engine.perform_quality_reading(&mut reader).unwrap();

        assert_eq!(rig.clock().now_ms() - start, 9 * 50);
        assert_eq!(r.raw.xyz(), [30000, 32000, 28000]);
        assert_eq!(r.raw.ir, 2000);
        assert!(!r.quality.has_saturation);
        assert!(!r.quality.has_low_signal);
        assert_eq!(r.quality.quality_score, 100);
        assert_eq!(r.quality.max_reading, 32000);
        assert_abs_diff_eq!(r.quality.coefficient_of_variation, 0.0, epsilon = 0.01);
        assert_relative_eq!(r.stats[1].mean, 32000.0, max_relative = 0.01);
    }

    #[test]
    fn test_quality_reading_propagates_failure() {
        let rig = SimRig::new(SceneState::dark());
        rig.scene().borrow_mut().disconnected = true;
        let mut reader = rig.reader();
        assert!(QualityEngine::default().perform_quality_reading(&mut reader).is_err());
    }
}
