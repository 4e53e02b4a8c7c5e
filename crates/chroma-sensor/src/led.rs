//! Closed-loop LED brightness search.
//!
//! A proportional-step controller: apply a brightness, wait, read the
//! control variable `max(X, Y, Z)`, and step towards the target window.
//! Gross saturation takes a larger step down. The loop is bounded by an
//! iteration count and the brightness limits, and never fails for not
//! reaching the window.

use chroma_core::{adc, Result, LED_MAX_BRIGHTNESS, LED_MIN_BRIGHTNESS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::DynamicSensorController;
use crate::hal::Illumination;
use crate::reader::RawChannelReader;

/// LED search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedOptimizerConfig {
    /// Lowest brightness the search may use.
    pub min_brightness: u8,
    /// Highest brightness the search may use.
    pub max_brightness: u8,
    /// Lower edge of the target window.
    pub target_min: u16,
    /// Upper edge of the target window.
    pub target_max: u16,
    /// Normal brightness step.
    pub step: u8,
    /// Step multiplier when the control variable is saturated.
    pub large_step_factor: u8,
    /// Iteration bound.
    pub max_iterations: u8,
    /// Settling delay after each brightness change.
    pub stabilize_ms: u64,
}

impl Default for LedOptimizerConfig {
    fn default() -> Self {
        Self {
            min_brightness: LED_MIN_BRIGHTNESS,
            max_brightness: LED_MAX_BRIGHTNESS,
            target_min: 5000,
            target_max: 60000,
            step: 8,
            large_step_factor: 4,
            max_iterations: 8,
            stabilize_ms: 100,
        }
    }
}

impl LedOptimizerConfig {
    /// `true` if `control` lies inside the target window.
    #[inline]
    pub fn in_window(&self, control: u16) -> bool {
        (self.target_min..=self.target_max).contains(&control)
    }
}

/// Result of a brightness search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedOutcome {
    /// Final brightness, already applied to the LED.
    pub brightness: u8,
    /// Last measured control variable.
    pub control: u16,
    /// Reads performed.
    pub iterations: u8,
    /// The last read was inside the target window.
    pub converged: bool,
}

impl DynamicSensorController {
    /// Searches for an LED brightness that puts `max(X, Y, Z)` inside the
    /// target window, starting from `start`.
    ///
    /// # Errors
    ///
    /// Only transport failures. Missing the window is reported through
    /// [`LedOutcome::converged`].
    pub fn optimize_led_brightness(
        &mut self,
        reader: &mut RawChannelReader,
        led: &mut dyn Illumination,
        config: &LedOptimizerConfig,
        start: u8,
    ) -> Result<LedOutcome> {
        let mut brightness = start.clamp(config.min_brightness, config.max_brightness);
        let mut control = 0;
        let mut iterations = 0;

        info!(start = brightness, "LED brightness optimisation");

        for _ in 0..config.max_iterations {
            led.set_led_brightness(brightness);
            reader.delay_ms(config.stabilize_ms);
            control = reader.try_read()?.max_visible();
            iterations += 1;
            debug!(iteration = iterations, brightness, control, "LED search step");

            if config.in_window(control) {
                self.set_led_brightness(brightness);
                info!(brightness, control, "LED brightness in target window");
                return Ok(LedOutcome {
                    brightness,
                    control,
                    iterations,
                    converged: true,
                });
            }

            let next = if control > config.target_max {
                let step = if control >= adc::SATURATION_THRESHOLD {
                    config.step.saturating_mul(config.large_step_factor)
                } else {
                    config.step
                };
                brightness.saturating_sub(step).max(config.min_brightness)
            } else {
                brightness.saturating_add(config.step).min(config.max_brightness)
            };

            if next == brightness {
                warn!(brightness, control, "LED brightness at limit");
                break;
            }
            brightness = next;
        }

        led.set_led_brightness(brightness);
        self.set_led_brightness(brightness);
        info!(brightness, control, iterations, "LED optimisation finished outside window");
        Ok(LedOutcome {
            brightness,
            control,
            iterations,
            converged: false,
        })
    }
}
