//! Hardware capability traits.
//!
//! The pipeline never talks to a bus or a PWM peripheral directly. Each
//! collaborator is a narrow trait, implemented once per platform and
//! injected into the components that need it. [`crate::sim`] provides
//! implementations backed by a simulated scene.

use chroma_core::{Channel, Gain, Result};
use std::time::{Duration, Instant};

/// Register-level access to the colour sensor.
///
/// Calls are synchronous and may fail with a transport error.
pub trait SensorTransport {
    /// Reads one 16-bit data channel.
    fn read_channel(&mut self, channel: Channel) -> Result<u16>;

    /// Writes the ATIME register.
    fn set_integration_time(&mut self, atime: u8) -> Result<()>;

    /// Writes the AGAIN register.
    fn set_gain(&mut self, gain: Gain) -> Result<()>;

    /// Reads the status register (see [`chroma_core::adc`] for bit flags).
    fn status(&mut self) -> Result<u8>;

    /// Configures the auto-zero mode and its iteration frequency.
    fn set_auto_zero(&mut self, mode: u8, frequency: u8) -> Result<()>;
}

/// Illumination LED and RGB indicator. Fire-and-forget.
pub trait Illumination {
    /// Sets the illumination LED level (0 = off).
    fn set_led_brightness(&mut self, level: u8);

    /// Shows a colour on the indicator LED.
    fn set_indicator_color(&mut self, rgb: [u8; 3], brightness: u8);
}

/// Monotonic time source with blocking delays.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Blocks the control loop for `ms` milliseconds.
    fn delay_ms(&self, ms: u64);
}

/// Hardware watchdog.
pub trait Watchdog {
    /// Resets the watchdog deadline.
    fn feed(&mut self);
}

/// Wall clock backed by [`Instant`] and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Watchdog that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn feed(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let start = clock.now_ms();
        clock.delay_ms(2);
        assert!(clock.now_ms() >= start + 2);
    }
}
