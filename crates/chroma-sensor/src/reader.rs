//! Raw channel reader with bounded retries.
//!
//! A full read is one transaction per channel (X, Y, Z, IR1, IR2). If any
//! channel fails the whole set is retried after a short backoff. When all
//! attempts fail the reader returns a capture with `valid = false` and
//! records the reason, which callers inspect through
//! [`RawChannelReader::last_error`].

use chroma_core::{adc, Channel, Error, Gain, RawChannelData, Result};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, error, trace, warn};

use crate::hal::{Clock, SensorTransport};

/// Retry policy for channel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Attempts per read, including the first.
    pub attempts: u8,
    /// Delay between attempts.
    pub backoff_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 50,
        }
    }
}

/// Reads raw captures from a [`SensorTransport`].
pub struct RawChannelReader {
    transport: Box<dyn SensorTransport>,
    clock: Rc<dyn Clock>,
    config: ReaderConfig,
    last_error: Option<Error>,
}

impl RawChannelReader {
    /// Creates a reader with the default retry policy.
    pub fn new(transport: Box<dyn SensorTransport>, clock: Rc<dyn Clock>) -> Self {
        Self::with_config(transport, clock, ReaderConfig::default())
    }

    /// Creates a reader with an explicit retry policy.
    pub fn with_config(
        transport: Box<dyn SensorTransport>,
        clock: Rc<dyn Clock>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            config,
            last_error: None,
        }
    }

    /// The retry policy.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The clock shared with the rest of the pipeline.
    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    /// Current time in milliseconds.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Blocks for `ms` milliseconds.
    #[inline]
    pub fn delay_ms(&self, ms: u64) {
        self.clock.delay_ms(ms);
    }

    /// Reason the most recent read failed, if it did.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn read_once(&mut self) -> std::result::Result<[u16; 5], (Channel, Error)> {
        let mut out = [0u16; 5];
        for (slot, ch) in out.iter_mut().zip(Channel::ALL) {
            *slot = self.transport.read_channel(ch).map_err(|e| (ch, e))?;
        }
        Ok(out)
    }

    /// Reads every channel, retrying the set on transport failure.
    ///
    /// # Errors
    ///
    /// [`Error::TransportReadFailed`] after the last attempt, or
    /// [`Error::SensorNotInitialized`] if the transport reports it.
    pub fn try_read(&mut self) -> Result<RawChannelData> {
        let attempts = self.config.attempts.max(1);
        let timestamp = self.now_ms();

        for attempt in 1..=attempts {
            match self.read_once() {
                Ok([x, y, z, ir1, ir2]) => {
                    let mut data = RawChannelData::new(x, y, z, ir1).at(timestamp);
                    data.ir2 = ir2;
                    data.saturated = self.check_saturation(&data);
                    self.last_error = None;
                    trace!(x, y, z, ir1, ir2, saturated = data.saturated, "raw channels read");
                    return Ok(data);
                }
                Err((channel, Error::SensorNotInitialized)) => {
                    error!(%channel, "sensor not initialized");
                    return Err(Error::SensorNotInitialized);
                }
                Err((channel, e)) => {
                    warn!(%channel, attempt, attempts, error = %e, "channel read failed");
                    if attempt < attempts {
                        self.delay_ms(self.config.backoff_ms);
                    } else {
                        return Err(Error::TransportReadFailed { channel, attempts });
                    }
                }
            }
        }
        Err(Error::SensorNotInitialized)
    }

    /// Reads every channel.
    ///
    /// Never fails: an exhausted read yields `valid = false` and the reason
    /// is kept in [`last_error`](Self::last_error).
    pub fn read(&mut self) -> RawChannelData {
        let timestamp = self.now_ms();
        match self.try_read() {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "raw channel read failed");
                self.last_error = Some(e);
                RawChannelData::invalid(timestamp)
            }
        }
    }

    /// Reads a single channel with the same retry policy.
    pub fn read_channel(&mut self, channel: Channel) -> Result<u16> {
        let attempts = self.config.attempts.max(1);
        for attempt in 1..=attempts {
            match self.transport.read_channel(channel) {
                Ok(v) => return Ok(v),
                Err(Error::SensorNotInitialized) => return Err(Error::SensorNotInitialized),
                Err(e) => {
                    warn!(%channel, attempt, error = %e, "channel read failed");
                    if attempt < attempts {
                        self.delay_ms(self.config.backoff_ms);
                    }
                }
            }
        }
        Err(Error::TransportReadFailed { channel, attempts })
    }

    /// Reads the status register.
    pub fn status(&mut self) -> Result<u8> {
        self.transport.status()
    }

    /// Returns `true` if the ASAT status bit is set. Status read failures
    /// count as not saturated.
    pub fn analog_saturation(&mut self) -> bool {
        match self.transport.status() {
            Ok(s) => s & adc::STATUS_ASAT != 0,
            Err(e) => {
                debug!(error = %e, "status read failed");
                false
            }
        }
    }

    /// Returns `true` if any channel is at or above the saturation
    /// threshold or the device reports analog saturation.
    pub fn check_saturation(&mut self, data: &RawChannelData) -> bool {
        data.exceeds(adc::SATURATION_THRESHOLD) || self.analog_saturation()
    }

    /// Writes integration time and gain.
    pub fn set_timing(&mut self, atime: u8, gain: Gain) -> Result<()> {
        self.transport.set_integration_time(atime)?;
        self.transport.set_gain(gain)
    }

    /// Configures auto-zero.
    ///
    /// # Errors
    ///
    /// Any transport failure is reported as [`Error::AutoZeroFailed`].
    pub fn configure_auto_zero(&mut self, mode: u8, frequency: u8) -> Result<()> {
        self.transport
            .set_auto_zero(mode, frequency)
            .map_err(|e| Error::AutoZeroFailed(e.to_string()))?;
        debug!(mode, frequency, "auto-zero configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SceneState, SimRig};

    fn rig() -> SimRig {
        SimRig::new(SceneState {
            ambient: [1000.0, 2000.0, 3000.0, 400.0],
            ..SceneState::dark()
        })
    }

    #[test]
    fn test_read_valid() {
        let rig = rig();
        let mut reader = rig.reader();
        let data = reader.read();
        assert!(data.valid);
        assert!(!data.saturated);
        assert_eq!(data.xyz(), [1000, 2000, 3000]);
        assert_eq!(data.ir, 400);
        assert!(reader.last_error().is_none());
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let rig = rig();
        rig.scene().borrow_mut().fail_reads = 2;
        let mut reader = rig.reader();
        let start = rig.clock().now_ms();
        let data = reader.read();
        assert!(data.valid);
        // two backoffs
        assert_eq!(rig.clock().now_ms() - start, 100);
    }

    #[test]
    fn test_exhausted_retries_invalid() {
        let rig = rig();
        rig.scene().borrow_mut().fail_reads = 10;
        let mut reader = rig.reader();
        let data = reader.read();
        assert!(!data.valid);
        assert!(matches!(
            reader.last_error(),
            Some(Error::TransportReadFailed { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_disconnected_sensor() {
        let rig = rig();
        rig.scene().borrow_mut().disconnected = true;
        let mut reader = rig.reader();
        assert!(matches!(reader.try_read(), Err(Error::SensorNotInitialized)));
    }

    #[test]
    fn test_saturation_threshold() {
        let rig = rig();
        let mut reader = rig.reader();
        for v in [65000u16, 65001, 65535] {
            assert!(reader.check_saturation(&RawChannelData::new(v, 100, 100, 10)));
        }
        for v in [0u16, 30000, 52427] {
            assert!(!reader.check_saturation(&RawChannelData::new(v, v, v, 10)));
        }
    }

    #[test]
    fn test_asat_status_flags_saturation() {
        let rig = rig();
        rig.scene().borrow_mut().status_bits = adc::STATUS_ASAT;
        let mut reader = rig.reader();
        assert!(reader.read().saturated);
    }

    #[test]
    fn test_auto_zero() {
        let rig = rig();
        let mut reader = rig.reader();
        reader.configure_auto_zero(1, 127).unwrap();
        assert_eq!(rig.scene().borrow().auto_zero, Some((1, 127)));

        rig.scene().borrow_mut().disconnected = true;
        assert!(matches!(
            reader.configure_auto_zero(1, 127),
            Err(Error::AutoZeroFailed(_))
        ));
    }
}
