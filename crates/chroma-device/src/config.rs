//! Device configuration.
//!
//! Every section has working defaults, so an empty document is a valid
//! config:
//!
//! ```yaml
//! sensor:
//!   integration_time: 150
//!   gain: X4
//!   led_brightness: 128
//! ir_thresholds:
//!   low: 0.15
//!   high: 0.35
//! continuous:
//!   duration_ms: 5000
//! sample_capacity: 30
//! ```

use chroma_calib::WorkflowConfig;
use chroma_color::IrThresholds;
use chroma_core::{Gain, LightingCondition, SensorConfig, DEFAULT_ATIME, DEFAULT_LED_BRIGHTNESS};
use chroma_sensor::{ControllerConfig, LedOptimizerConfig, QualityConfig, ReaderConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{DeviceError, DeviceResult};

/// Sensor start-up settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorDefaults {
    /// ATIME register value.
    pub integration_time: u8,
    /// Analog gain.
    pub gain: Gain,
    /// LED brightness used before the optimiser has run.
    pub led_brightness: u8,
    /// Auto-zero mode.
    pub auto_zero_mode: u8,
    /// Auto-zero frequency.
    pub auto_zero_frequency: u8,
}

impl Default for SensorDefaults {
    fn default() -> Self {
        Self {
            integration_time: DEFAULT_ATIME,
            gain: Gain::X4,
            led_brightness: DEFAULT_LED_BRIGHTNESS,
            auto_zero_mode: 1,
            auto_zero_frequency: 127,
        }
    }
}

impl SensorDefaults {
    /// The initial controller configuration.
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            integration_time: self.integration_time,
            gain: self.gain,
            led_brightness: self.led_brightness,
            lighting_condition: LightingCondition::Indoor,
            is_optimal: false,
            timestamp_ms: 0,
        }
    }
}

/// Continuous scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousScanConfig {
    /// Window length.
    pub duration_ms: u64,
    /// Reading cap inside the window.
    pub max_readings: usize,
    /// Delay between readings.
    pub interval_ms: u64,
}

impl Default for ContinuousScanConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5000,
            max_readings: 200,
            interval_ms: 25,
        }
    }
}

/// Complete device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Start-up sensor settings.
    pub sensor: SensorDefaults,
    /// IR blend thresholds.
    pub ir_thresholds: IrThresholds,
    /// Read retry policy.
    pub reader: ReaderConfig,
    /// Controller timing.
    pub controller: ControllerConfig,
    /// LED brightness search.
    pub led: LedOptimizerConfig,
    /// Quality burst.
    pub quality: QualityConfig,
    /// Calibration session.
    pub workflow: WorkflowConfig,
    /// Continuous scan window.
    pub continuous: ContinuousScanConfig,
    /// Interval between background sensor optimisations.
    pub optimize_interval_ms: u64,
    /// Sample ring-buffer capacity.
    pub sample_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sensor: SensorDefaults::default(),
            ir_thresholds: IrThresholds::default(),
            reader: ReaderConfig::default(),
            controller: ControllerConfig::default(),
            led: LedOptimizerConfig::default(),
            quality: QualityConfig::default(),
            workflow: WorkflowConfig::default(),
            continuous: ContinuousScanConfig::default(),
            optimize_interval_ms: 5000,
            sample_capacity: 30,
        }
    }
}

impl DeviceConfig {
    /// Loads and validates a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> DeviceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DeviceError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading device config");
        Self::from_yaml_str(&content)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> DeviceResult<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialises the config to YAML.
    pub fn to_yaml(&self) -> DeviceResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> DeviceResult<()> {
        self.sensor
            .sensor_config()
            .validate()
            .map_err(|e| DeviceError::invalid_config(format!("sensor: {e}")))?;
        IrThresholds::new(self.ir_thresholds.low, self.ir_thresholds.high)
            .map_err(|e| DeviceError::invalid_config(format!("ir_thresholds: {e}")))?;
        if self.led.min_brightness > self.led.max_brightness {
            return Err(DeviceError::invalid_config("led: min_brightness above max_brightness"));
        }
        if self.led.target_min >= self.led.target_max {
            return Err(DeviceError::invalid_config("led: empty target window"));
        }
        if self.quality.samples == 0 {
            return Err(DeviceError::invalid_config("quality: samples must be positive"));
        }
        if self.workflow.white_readings == 0 || self.workflow.black_readings == 0 {
            return Err(DeviceError::invalid_config("workflow: reading counts must be positive"));
        }
        if self.continuous.max_readings == 0 {
            return Err(DeviceError::invalid_config("continuous: max_readings must be positive"));
        }
        if self.sample_capacity == 0 {
            return Err(DeviceError::invalid_config("sample_capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let c = DeviceConfig::from_yaml_str("").unwrap();
        assert_eq!(c.sensor, SensorDefaults::default());
        assert_eq!(c.continuous.max_readings, 200);
        assert_eq!(c.optimize_interval_ms, 5000);
        assert_eq!(c.sample_capacity, 30);
        assert_eq!(c.workflow.timeout_ms, 30_000);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
sensor:
  gain: X16
  led_brightness: 200
ir_thresholds:
  low: 0.1
  high: 0.5
continuous:
  duration_ms: 1000
workflow:
  countdown_s: 1
"#;
        let c = DeviceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.sensor.gain, Gain::X16);
        assert_eq!(c.sensor.led_brightness, 200);
        assert_eq!(c.sensor.integration_time, DEFAULT_ATIME);
        assert_eq!(c.ir_thresholds.high, 0.5);
        assert_eq!(c.continuous.duration_ms, 1000);
        assert_eq!(c.continuous.interval_ms, 25);
        assert_eq!(c.workflow.countdown_s, 1);
        assert_eq!(c.workflow.white_readings, 10);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = DeviceConfig::from_yaml_str("ir_thresholds:\n  low: 0.5\n  high: 0.2\n").unwrap_err();
        assert!(err.is_config_error());

        let err = DeviceConfig::from_yaml_str("sensor:\n  led_brightness: 10\n").unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfig(_)));

        let err = DeviceConfig::from_yaml_str("sample_capacity: 0\n").unwrap_err();
        assert!(matches!(err, DeviceError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "optimize_interval_ms: 2000").unwrap();
        drop(f);

        let c = DeviceConfig::from_file(&path).unwrap();
        assert_eq!(c.optimize_interval_ms, 2000);

        let missing = DeviceConfig::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, DeviceError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let c = DeviceConfig::default();
        let back = DeviceConfig::from_yaml_str(&c.to_yaml().unwrap()).unwrap();
        assert_eq!(back.sensor, c.sensor);
        assert_eq!(back.led, c.led);
        assert_eq!(back.continuous, c.continuous);
    }
}
