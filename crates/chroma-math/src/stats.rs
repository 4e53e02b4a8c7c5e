//! Descriptive statistics over repeated sensor samples.

use serde::{Deserialize, Serialize};

/// Default outlier threshold, in standard deviations.
pub const OUTLIER_SIGMA: f32 = 2.0;

/// Summary statistics of a sample set.
///
/// Variance is the population variance (divides by `n`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleStats {
    /// Arithmetic mean.
    pub mean: f32,
    /// Population standard deviation.
    pub std_dev: f32,
    /// `std_dev / mean`, or 0 when the mean is 0.
    pub coefficient_of_variation: f32,
    /// Smallest sample.
    pub min: f32,
    /// Largest sample.
    pub max: f32,
    /// Samples further than the outlier threshold from the mean.
    pub outlier_count: usize,
    /// Number of samples.
    pub count: usize,
}

impl SampleStats {
    /// Computes statistics with outliers beyond `outlier_sigma` deviations.
    ///
    /// An empty slice yields all zeros.
    ///
    /// # Example
    ///
    /// ```rust
    /// use chroma_math::SampleStats;
    ///
    /// let s = SampleStats::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 2.0);
    /// assert_eq!(s.mean, 5.0);
    /// assert_eq!(s.std_dev, 2.0);
    /// assert_eq!(s.outlier_count, 0);
    /// ```
    pub fn compute(samples: &[f32], outlier_sigma: f32) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f32;
        let mean = samples.iter().sum::<f32>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
        let std_dev = variance.sqrt();
        let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let limit = outlier_sigma * std_dev;
        let outlier_count = if std_dev > 0.0 {
            samples.iter().filter(|s| (*s - mean).abs() > limit).count()
        } else {
            0
        };

        Self {
            mean,
            std_dev,
            coefficient_of_variation: if mean > 0.0 { std_dev / mean } else { 0.0 },
            min,
            max,
            outlier_count,
            count: samples.len(),
        }
    }

    /// Computes statistics over raw 16-bit counts.
    pub fn from_counts(samples: &[u16], outlier_sigma: f32) -> Self {
        let values: Vec<f32> = samples.iter().map(|&v| v as f32).collect();
        Self::compute(&values, outlier_sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identical_samples() {
        let s = SampleStats::from_counts(&[30000; 10], OUTLIER_SIGMA);
        assert_eq!(s.mean, 30000.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.coefficient_of_variation, 0.0);
        assert_eq!(s.outlier_count, 0);
        assert_eq!(s.count, 10);
    }

    #[test]
    fn test_single_spike_is_outlier() {
        let mut samples = [1000.0f32; 10];
        samples[3] = 5000.0;
        let s = SampleStats::compute(&samples, OUTLIER_SIGMA);
        assert_eq!(s.outlier_count, 1);
        assert_eq!(s.max, 5000.0);
        assert_eq!(s.min, 1000.0);
        assert_relative_eq!(s.mean, 1400.0);
    }

    #[test]
    fn test_empty() {
        assert_eq!(SampleStats::compute(&[], OUTLIER_SIGMA), SampleStats::default());
    }
}
