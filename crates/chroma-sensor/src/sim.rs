//! Simulated sensor rig.
//!
//! A [`SceneState`] describes what the sensor is looking at: a surface
//! response per LED level, ambient light, and the current register state.
//! [`SimRig`] hands out transport, illumination, clock and watchdog handles
//! that all share one scene, so an LED change is visible to the next read.
//!
//! ```text
//! count = (ambient + response * led_level) * sensitivity
//! sensitivity = (gain / 4x) * (atime + 1) / 151      (if tracked, else 1)
//! ```

use chroma_core::{adc, Channel, Error, Gain, Result, DEFAULT_ATIME};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::hal::{Clock, Illumination, SensorTransport, Watchdog};
use crate::reader::{RawChannelReader, ReaderConfig};

/// Everything the simulated sensor observes.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    /// Illumination LED level.
    pub led_level: u8,
    /// Counts per LED level for X, Y, Z, IR.
    pub response: [f32; 4],
    /// Counts independent of the LED for X, Y, Z, IR.
    pub ambient: [f32; 4],
    /// Scale counts with gain and integration time.
    pub track_sensitivity: bool,
    /// Deterministic alternating noise amplitude in counts.
    pub noise: f32,
    /// ATIME register.
    pub integration_time: u8,
    /// AGAIN register.
    pub gain: Gain,
    /// Status register value.
    pub status_bits: u8,
    /// Number of upcoming channel reads that fail.
    pub fail_reads: u32,
    /// Every transaction fails with `SensorNotInitialized`.
    pub disconnected: bool,
    /// Last auto-zero configuration.
    pub auto_zero: Option<(u8, u8)>,
    /// Last indicator colour and brightness.
    pub indicator: Option<([u8; 3], u8)>,
    /// Successful channel reads so far.
    pub reads: u64,
}

impl SceneState {
    /// No light at all.
    pub fn dark() -> Self {
        Self {
            led_level: 0,
            response: [0.0; 4],
            ambient: [0.0; 4],
            track_sensitivity: false,
            noise: 0.0,
            integration_time: DEFAULT_ATIME,
            gain: Gain::X4,
            status_bits: 0,
            fail_reads: 0,
            disconnected: false,
            auto_zero: None,
            indicator: None,
            reads: 0,
        }
    }

    /// A surface lit only by the LED.
    pub fn lit(response: [f32; 4]) -> Self {
        Self {
            response,
            ..Self::dark()
        }
    }

    /// A white tile reading about (50000, 52000, 48000, IR 3000) at LED 128.
    pub fn white_tile() -> Self {
        Self::lit([50000.0 / 128.0, 52000.0 / 128.0, 48000.0 / 128.0, 3000.0 / 128.0])
    }

    fn sensitivity(&self) -> f32 {
        if !self.track_sensitivity {
            return 1.0;
        }
        let gain = self.gain.multiplier() / Gain::X4.multiplier();
        let time = (self.integration_time as f32 + 1.0) / (DEFAULT_ATIME as f32 + 1.0);
        gain * time
    }

    fn count(&mut self, channel: Channel) -> u16 {
        let i = match channel {
            Channel::X => 0,
            Channel::Y => 1,
            Channel::Z => 2,
            Channel::Ir1 | Channel::Ir2 => 3,
        };
        let sign = if self.reads % 2 == 0 { 1.0 } else { -1.0 };
        self.reads += 1;
        let v = (self.ambient[i] + self.response[i] * self.led_level as f32) * self.sensitivity()
            + sign * self.noise;
        v.round().clamp(0.0, adc::FULL_SCALE as f32) as u16
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::dark()
    }
}

/// Clock advanced only by delays and explicit calls.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Creates a clock at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

/// Transport over a shared scene.
#[derive(Debug, Clone)]
pub struct SimTransport {
    scene: Rc<RefCell<SceneState>>,
}

impl SensorTransport for SimTransport {
    fn read_channel(&mut self, channel: Channel) -> Result<u16> {
        let mut s = self.scene.borrow_mut();
        if s.disconnected {
            return Err(Error::SensorNotInitialized);
        }
        if s.fail_reads > 0 {
            s.fail_reads -= 1;
            return Err(Error::TransportReadFailed { channel, attempts: 1 });
        }
        Ok(s.count(channel))
    }

    fn set_integration_time(&mut self, atime: u8) -> Result<()> {
        let mut s = self.scene.borrow_mut();
        if s.disconnected {
            return Err(Error::SensorNotInitialized);
        }
        s.integration_time = atime;
        Ok(())
    }

    fn set_gain(&mut self, gain: Gain) -> Result<()> {
        let mut s = self.scene.borrow_mut();
        if s.disconnected {
            return Err(Error::SensorNotInitialized);
        }
        s.gain = gain;
        Ok(())
    }

    fn status(&mut self) -> Result<u8> {
        let s = self.scene.borrow();
        if s.disconnected {
            return Err(Error::SensorNotInitialized);
        }
        Ok(s.status_bits)
    }

    fn set_auto_zero(&mut self, mode: u8, frequency: u8) -> Result<()> {
        let mut s = self.scene.borrow_mut();
        if s.disconnected {
            return Err(Error::SensorNotInitialized);
        }
        s.auto_zero = Some((mode, frequency));
        Ok(())
    }
}

/// LED and indicator over a shared scene.
#[derive(Debug, Clone)]
pub struct SimIllumination {
    scene: Rc<RefCell<SceneState>>,
}

impl Illumination for SimIllumination {
    fn set_led_brightness(&mut self, level: u8) {
        self.scene.borrow_mut().led_level = level;
    }

    fn set_indicator_color(&mut self, rgb: [u8; 3], brightness: u8) {
        self.scene.borrow_mut().indicator = Some((rgb, brightness));
    }
}

/// Watchdog that counts feeds.
#[derive(Debug, Clone, Default)]
pub struct SimWatchdog {
    feeds: Rc<Cell<u64>>,
}

impl SimWatchdog {
    /// Number of feeds so far.
    pub fn feeds(&self) -> u64 {
        self.feeds.get()
    }
}

impl Watchdog for SimWatchdog {
    fn feed(&mut self) {
        self.feeds.set(self.feeds.get() + 1);
    }
}

/// A scene plus handles onto it.
#[derive(Debug, Clone)]
pub struct SimRig {
    scene: Rc<RefCell<SceneState>>,
    clock: ManualClock,
    watchdog: SimWatchdog,
}

impl SimRig {
    /// Creates a rig at t = 0.
    pub fn new(scene: SceneState) -> Self {
        Self {
            scene: Rc::new(RefCell::new(scene)),
            clock: ManualClock::new(),
            watchdog: SimWatchdog::default(),
        }
    }

    /// The shared scene.
    pub fn scene(&self) -> &Rc<RefCell<SceneState>> {
        &self.scene
    }

    /// Replaces what the sensor looks at, keeping register and LED state.
    pub fn set_surface(&self, response: [f32; 4], ambient: [f32; 4]) {
        let mut s = self.scene.borrow_mut();
        s.response = response;
        s.ambient = ambient;
    }

    /// Clock handle.
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Transport handle.
    pub fn transport(&self) -> SimTransport {
        SimTransport {
            scene: Rc::clone(&self.scene),
        }
    }

    /// Illumination handle.
    pub fn illumination(&self) -> SimIllumination {
        SimIllumination {
            scene: Rc::clone(&self.scene),
        }
    }

    /// Watchdog handle.
    pub fn watchdog(&self) -> SimWatchdog {
        self.watchdog.clone()
    }

    /// A reader over this rig with the default retry policy.
    pub fn reader(&self) -> RawChannelReader {
        self.reader_with(ReaderConfig::default())
    }

    /// A reader over this rig.
    pub fn reader_with(&self, config: ReaderConfig) -> RawChannelReader {
        RawChannelReader::with_config(Box::new(self.transport()), Rc::new(self.clock()), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_drives_counts() {
        let rig = SimRig::new(SceneState::white_tile());
        let mut led = rig.illumination();
        let mut t = rig.transport();
        assert_eq!(t.read_channel(Channel::Y).unwrap(), 0);
        led.set_led_brightness(128);
        assert_eq!(t.read_channel(Channel::Y).unwrap(), 52000);
        led.set_led_brightness(255);
        assert_eq!(t.read_channel(Channel::X).unwrap(), 65535);
    }

    #[test]
    fn test_sensitivity_tracking() {
        let rig = SimRig::new(SceneState {
            ambient: [1000.0; 4],
            track_sensitivity: true,
            ..SceneState::dark()
        });
        let mut t = rig.transport();
        assert_eq!(t.read_channel(Channel::Y).unwrap(), 1000);
        t.set_gain(Gain::X16).unwrap();
        assert_eq!(t.read_channel(Channel::Y).unwrap(), 4000);
    }

    #[test]
    fn test_manual_clock_shared() {
        let rig = SimRig::new(SceneState::dark());
        let a = rig.clock();
        let b = rig.clock();
        a.delay_ms(150);
        assert_eq!(b.now_ms(), 150);
    }
}
