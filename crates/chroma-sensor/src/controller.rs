//! Dynamic integration-time and gain control.
//!
//! Coarse control picks a canned [`SensorConfig`] per [`LightingCondition`]
//! tier. Fine control nudges the live configuration one step at a time:
//!
//! ```text
//! saturated:   gain down  -> else integration time down (floor 20)
//! weak signal: integration time up (ceiling 200) -> else gain up
//! ```
//!
//! Adjustments are rate limited by a cooldown so the loop cannot
//! oscillate.

use chroma_core::{
    adc, Channel, Error, Gain, LightingCondition, Result, SensorConfig, ATIME_MAX, ATIME_MID,
    ATIME_MIN, ATIME_STEP, LED_MAX_BRIGHTNESS, LED_MIN_BRIGHTNESS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::reader::RawChannelReader;

/// Canned configuration per lighting tier, indexed in tier order.
pub const PRESETS: [SensorConfig; 4] = [
    SensorConfig::preset(ATIME_MAX, Gain::X64, LED_MAX_BRIGHTNESS, LightingCondition::Dark),
    SensorConfig::preset(ATIME_MID, Gain::X16, 128, LightingCondition::Indoor),
    SensorConfig::preset(ATIME_MIN, Gain::X4, LED_MIN_BRIGHTNESS + 32, LightingCondition::Bright),
    SensorConfig::preset(ATIME_MIN, Gain::X1, LED_MIN_BRIGHTNESS, LightingCondition::VeryBright),
];

/// Controller timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Settling delay after a register change.
    pub stabilize_ms: u64,
    /// Minimum time between two adjustments.
    pub cooldown_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stabilize_ms: 200,
            cooldown_ms: 400,
        }
    }
}

/// What one optimisation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustment {
    /// Inside the cooldown window; nothing checked.
    Skipped,
    /// Switched to the preset for a new lighting tier.
    Preset(LightingCondition),
    /// Lowered gain to clear saturation.
    GainDown(Gain),
    /// Shortened integration to clear saturation.
    IntegrationDown(u8),
    /// Lengthened integration to raise a weak signal.
    IntegrationUp(u8),
    /// Raised gain to lift a weak signal.
    GainUp(Gain),
    /// Settings are fine or already at their limits.
    Unchanged,
}

/// Closed-loop sensor configuration controller.
#[derive(Debug, Clone)]
pub struct DynamicSensorController {
    current: SensorConfig,
    settings: ControllerConfig,
    last_adjustment_ms: Option<u64>,
    adjustment_failures: u32,
    initialized: bool,
}

impl DynamicSensorController {
    /// Creates a controller holding the default configuration.
    pub fn new(settings: ControllerConfig) -> Self {
        Self::with_config(settings, SensorConfig::default())
    }

    /// Creates a controller starting from `initial`.
    pub fn with_config(settings: ControllerConfig, initial: SensorConfig) -> Self {
        Self {
            current: initial,
            settings,
            last_adjustment_ms: None,
            adjustment_failures: 0,
            initialized: false,
        }
    }

    /// Pushes the initial configuration to the sensor.
    pub fn initialize(&mut self, reader: &mut RawChannelReader) -> Result<()> {
        self.apply_config(reader, self.current)?;
        self.initialized = true;
        info!(config = ?self.current, "sensor controller initialized");
        Ok(())
    }

    /// `true` after a successful [`initialize`](Self::initialize).
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The live configuration.
    pub fn current_config(&self) -> &SensorConfig {
        &self.current
    }

    /// Controller timing.
    pub fn settings(&self) -> &ControllerConfig {
        &self.settings
    }

    /// Consecutive failed preset applications.
    pub fn adjustment_failures(&self) -> u32 {
        self.adjustment_failures
    }

    /// The canned configuration for a tier.
    pub fn optimal_config(condition: LightingCondition) -> SensorConfig {
        PRESETS[condition as usize]
    }

    /// Classifies ambient brightness from the Y channel.
    pub fn detect_lighting_condition(&self, reader: &mut RawChannelReader) -> Result<LightingCondition> {
        let y = reader.read_channel(Channel::Y)?;
        let condition = LightingCondition::classify(y);
        debug!(y, %condition, "lighting detected");
        Ok(condition)
    }

    /// Validates and applies a configuration, then waits for it to settle.
    pub fn apply_config(&mut self, reader: &mut RawChannelReader, config: SensorConfig) -> Result<()> {
        config.validate()?;
        reader.set_timing(config.integration_time, config.gain)?;
        self.current = SensorConfig {
            timestamp_ms: reader.now_ms(),
            ..config
        };
        debug!(
            atime = config.integration_time,
            gain = %config.gain,
            led = config.led_brightness,
            "sensor config applied"
        );
        reader.delay_ms(self.settings.stabilize_ms);
        Ok(())
    }

    /// Records the LED level chosen by the optimiser.
    pub fn set_led_brightness(&mut self, level: u8) {
        self.current.led_brightness = level.clamp(LED_MIN_BRIGHTNESS, LED_MAX_BRIGHTNESS);
    }

    fn in_cooldown(&self, now: u64) -> bool {
        self.last_adjustment_ms
            .is_some_and(|last| now.saturating_sub(last) < self.settings.cooldown_ms)
    }

    fn commit(&mut self, reader: &mut RawChannelReader, config: SensorConfig) -> Result<()> {
        self.apply_config(reader, config)?;
        self.last_adjustment_ms = Some(reader.now_ms());
        Ok(())
    }

    /// One optimisation pass.
    ///
    /// Failing to reach a good signal is not an error; only transport
    /// failures are.
    pub fn optimize_sensor_settings(&mut self, reader: &mut RawChannelReader) -> Result<Adjustment> {
        if !self.initialized {
            return Err(Error::SensorNotInitialized);
        }
        if self.in_cooldown(reader.now_ms()) {
            return Ok(Adjustment::Skipped);
        }

        let condition = self.detect_lighting_condition(reader)?;
        if condition != self.current.lighting_condition || !self.current.is_optimal {
            info!(from = %self.current.lighting_condition, to = %condition, "lighting condition changed");
            let preset = SensorConfig {
                led_brightness: self.current.led_brightness,
                ..Self::optimal_config(condition)
            };
            if let Err(e) = self.commit(reader, preset) {
                self.adjustment_failures += 1;
                warn!(error = %e, failures = self.adjustment_failures, "preset not applied");
                return Err(e);
            }
            self.adjustment_failures = 0;
            return Ok(Adjustment::Preset(condition));
        }

        let raw = reader.try_read()?;
        let mut next = self.current;

        let saturated = reader.analog_saturation() || raw.max_visible() > adc::SIGNAL_HARD_MAX;
        if saturated {
            if let Some(gain) = next.gain.lower() {
                warn!(%gain, "saturation, lowering gain");
                next.gain = gain;
                self.commit(reader, next)?;
                return Ok(Adjustment::GainDown(gain));
            }
            if next.integration_time > ATIME_MIN {
                next.integration_time = next.integration_time.saturating_sub(ATIME_STEP).max(ATIME_MIN);
                warn!(atime = next.integration_time, "saturation, shortening integration");
                self.commit(reader, next)?;
                return Ok(Adjustment::IntegrationDown(next.integration_time));
            }
            warn!("cannot reduce sensitivity further");
        }

        if raw.min_visible() <= adc::SIGNAL_HARD_MIN {
            if next.integration_time < ATIME_MAX {
                next.integration_time = next.integration_time.saturating_add(ATIME_STEP).min(ATIME_MAX);
                warn!(atime = next.integration_time, "weak signal, lengthening integration");
                self.commit(reader, next)?;
                return Ok(Adjustment::IntegrationUp(next.integration_time));
            }
            if let Some(gain) = next.gain.higher() {
                warn!(%gain, "weak signal, raising gain");
                next.gain = gain;
                self.commit(reader, next)?;
                return Ok(Adjustment::GainUp(gain));
            }
            warn!("cannot increase sensitivity further");
        }

        Ok(Adjustment::Unchanged)
    }

    /// Returns to the default configuration and clears controller state.
    pub fn reset(&mut self, reader: &mut RawChannelReader) -> Result<()> {
        self.last_adjustment_ms = None;
        self.adjustment_failures = 0;
        self.current = SensorConfig::default();
        if self.initialized {
            self.apply_config(reader, self.current)?;
        }
        info!("sensor controller reset to defaults");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SceneState, SimRig};

    fn rig_with_y(y: f32) -> SimRig {
        SimRig::new(SceneState {
            ambient: [y, y, y, 100.0],
            ..SceneState::dark()
        })
    }

    fn started(rig: &SimRig) -> (DynamicSensorController, RawChannelReader) {
        let mut reader = rig.reader();
        let mut ctl = DynamicSensorController::new(ControllerConfig::default());
        ctl.initialize(&mut reader).unwrap();
        (ctl, reader)
    }

    #[test]
    fn test_presets() {
        let dark = DynamicSensorController::optimal_config(LightingCondition::Dark);
        assert_eq!((dark.integration_time, dark.gain, dark.led_brightness), (200, Gain::X64, 255));
        let indoor = DynamicSensorController::optimal_config(LightingCondition::Indoor);
        assert_eq!((indoor.integration_time, indoor.gain), (100, Gain::X16));
        let bright = DynamicSensorController::optimal_config(LightingCondition::Bright);
        assert_eq!((bright.integration_time, bright.gain, bright.led_brightness), (20, Gain::X4, 96));
        let vb = DynamicSensorController::optimal_config(LightingCondition::VeryBright);
        assert_eq!((vb.gain, vb.led_brightness), (Gain::X1, 64));
        assert!(PRESETS.iter().all(|p| p.is_optimal && p.validate().is_ok()));
    }

    #[test]
    fn test_detect_tiers() {
        for (y, want) in [
            (500.0, LightingCondition::Dark),
            (5000.0, LightingCondition::Indoor),
            (20000.0, LightingCondition::Bright),
            (50000.0, LightingCondition::VeryBright),
        ] {
            let rig = rig_with_y(y);
            let (ctl, mut reader) = started(&rig);
            assert_eq!(ctl.detect_lighting_condition(&mut reader).unwrap(), want);
        }
    }

    #[test]
    fn test_first_pass_applies_preset() {
        let rig = rig_with_y(20000.0);
        let (mut ctl, mut reader) = started(&rig);
        assert_eq!(
            ctl.optimize_sensor_settings(&mut reader).unwrap(),
            Adjustment::Preset(LightingCondition::Bright)
        );
        assert_eq!(rig.scene().borrow().gain, Gain::X4);
        assert_eq!(rig.scene().borrow().integration_time, 20);
    }

    #[test]
    fn test_cooldown_skips() {
        let rig = rig_with_y(20000.0);
        let (mut ctl, mut reader) = started(&rig);
        ctl.optimize_sensor_settings(&mut reader).unwrap();
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::Skipped);
        rig.clock().advance(400);
        assert_ne!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::Skipped);
    }

    #[test]
    fn test_saturation_lowers_gain_then_integration() {
        let rig = rig_with_y(60000.0);
        let (mut ctl, mut reader) = started(&rig);
        let very_bright = SensorConfig {
            gain: Gain::X4,
            ..DynamicSensorController::optimal_config(LightingCondition::VeryBright)
        };
        ctl.apply_config(&mut reader, SensorConfig { integration_time: 60, ..very_bright })
            .unwrap();

        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::GainDown(Gain::X1));
        rig.clock().advance(400);
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::IntegrationDown(40));
        rig.clock().advance(400);
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::IntegrationDown(20));
        rig.clock().advance(400);
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::Unchanged);
        assert_eq!(ctl.current_config().integration_time, ATIME_MIN);
    }

    #[test]
    fn test_weak_signal_raises_integration_then_gain() {
        let rig = SimRig::new(SceneState {
            ambient: [100.0, 500.0, 100.0, 10.0],
            ..SceneState::dark()
        });
        let (mut ctl, mut reader) = started(&rig);
        let dark = DynamicSensorController::optimal_config(LightingCondition::Dark);
        ctl.apply_config(&mut reader, SensorConfig { integration_time: 180, gain: Gain::X16, ..dark })
            .unwrap();

        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::IntegrationUp(200));
        rig.clock().advance(400);
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::GainUp(Gain::X64));
        rig.clock().advance(400);
        assert_eq!(ctl.optimize_sensor_settings(&mut reader).unwrap(), Adjustment::Unchanged);
    }

    #[test]
    fn test_uninitialized_rejected() {
        let rig = rig_with_y(5000.0);
        let mut reader = rig.reader();
        let mut ctl = DynamicSensorController::new(ControllerConfig::default());
        assert!(matches!(
            ctl.optimize_sensor_settings(&mut reader),
            Err(Error::SensorNotInitialized)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let rig = rig_with_y(5000.0);
        let (mut ctl, mut reader) = started(&rig);
        let bad = SensorConfig { integration_time: 5, ..SensorConfig::default() };
        assert!(ctl.apply_config(&mut reader, bad).is_err());
        assert_eq!(ctl.current_config().integration_time, 150);
    }
}
