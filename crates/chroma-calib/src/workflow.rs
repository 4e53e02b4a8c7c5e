//! White/black reference calibration session.
//!
//! [`CalibrationWorkflow`] is a pure state machine: it never touches the
//! sensor. The device performs the scans and reports their averaged counts
//! back; time comes in through the `now_ms` arguments.
//!
//! ```text
//! Idle -start-> WhiteCountdown -0-> WhiteScanning -ok-> WhiteComplete -> BlackPrompt
//!      -confirm-> BlackCountdown -0-> BlackScanning -ok-> BlackComplete
//!      -save-> Saving -> Complete
//!
//! any state -failure-> Error      any state -cancel/timeout-> Idle
//! ```
//!
//! Only one session runs at a time. Cancelling always discards the white
//! and black references collected so far.

use chroma_color::WhiteReference;
use chroma_core::{
    BlackCalibration, Channel, Error, RawChannelData, WhiteCalibration, LED_MAX_BRIGHTNESS,
    LED_MIN_BRIGHTNESS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::error::{CalibError, CalibResult};

/// Countdown tick length.
pub const COUNTDOWN_INTERVAL_MS: u64 = 1000;

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkflowState {
    /// No session.
    #[default]
    Idle,
    /// Counting down before the white scan.
    WhiteCountdown,
    /// Ready for or performing the white scan.
    WhiteScanning,
    /// White reference accepted.
    WhiteComplete,
    /// Waiting for the user to present the black reference.
    BlackPrompt,
    /// Counting down before the black scan.
    BlackCountdown,
    /// Ready for or performing the black scan.
    BlackScanning,
    /// Black reference accepted.
    BlackComplete,
    /// Persisting references.
    Saving,
    /// Session finished and saved.
    Complete,
    /// Session failed; cancel or restart.
    Error,
}

impl WorkflowState {
    /// `true` while a countdown is running.
    pub fn is_countdown(self) -> bool {
        matches!(self, Self::WhiteCountdown | Self::BlackCountdown)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::WhiteCountdown => "white_countdown",
            Self::WhiteScanning => "white_scanning",
            Self::WhiteComplete => "white_complete",
            Self::BlackPrompt => "black_prompt",
            Self::BlackCountdown => "black_countdown",
            Self::BlackScanning => "black_scanning",
            Self::BlackComplete => "black_complete",
            Self::Saving => "saving",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Session timing and validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Countdown length in seconds.
    pub countdown_s: u8,
    /// Session timeout.
    pub timeout_ms: u64,
    /// Wait after switching the LED.
    pub led_stabilize_ms: u64,
    /// Wait after a sensor setting change.
    pub sensor_stabilize_ms: u64,
    /// Delay before each reference reading.
    pub reading_interval_ms: u64,
    /// Readings averaged for the white reference.
    pub white_readings: usize,
    /// Readings averaged for the black reference.
    pub black_readings: usize,
    /// Lowest accepted white count.
    pub white_floor: u16,
    /// Highest accepted white count.
    pub white_ceiling: u16,
    /// Largest accepted white max/min channel ratio.
    pub white_balance_ratio: f32,
    /// Largest black/white ratio per channel.
    pub black_fraction: f32,
    /// Largest absolute black count.
    pub black_ceiling: u16,
    /// Largest pairwise black channel ratio.
    pub black_channel_ratio: f32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            countdown_s: 3,
            timeout_ms: 30_000,
            led_stabilize_ms: 1000,
            sensor_stabilize_ms: 300,
            reading_interval_ms: 150,
            white_readings: 10,
            black_readings: 5,
            white_floor: 1000,
            white_ceiling: 60000,
            white_balance_ratio: 2.5,
            black_fraction: 0.15,
            black_ceiling: 1000,
            black_channel_ratio: 3.0,
        }
    }
}

impl WorkflowConfig {
    /// Checks a white reference for saturation, weak signal and balance.
    pub fn validate_white(&self, white: &WhiteCalibration) -> CalibResult<()> {
        let channels = [(Channel::X, white.x), (Channel::Y, white.y), (Channel::Z, white.z)];
        for (channel, value) in channels {
            if value > self.white_ceiling {
                return Err(Error::Saturation { channel, value }.into());
            }
        }
        for (channel, value) in channels {
            if value < self.white_floor {
                return Err(Error::InsufficientSignal {
                    channel,
                    value,
                    minimum: self.white_floor,
                }
                .into());
            }
        }
        let max = white.x.max(white.y).max(white.z) as f32;
        let min = white.x.min(white.y).min(white.z) as f32;
        let ratio = max / min;
        if ratio > self.white_balance_ratio {
            return Err(Error::PoorWhiteBalance {
                ratio,
                limit: self.white_balance_ratio,
            }
            .into());
        }
        Ok(())
    }

    /// Checks a black reference against the white one and absolute limits.
    pub fn validate_black(
        &self,
        black: &BlackCalibration,
        white: Option<&WhiteCalibration>,
    ) -> CalibResult<()> {
        let channels = [(Channel::X, black.x), (Channel::Y, black.y), (Channel::Z, black.z)];
        if let Some(w) = white.filter(|w| w.valid) {
            for ((channel, value), reference) in channels.into_iter().zip(w.xyz()) {
                let limit = reference * self.black_fraction;
                if value as f32 > limit {
                    return Err(CalibError::BlackTooBright { channel, value, limit });
                }
            }
        }
        for (channel, value) in channels {
            if value > self.black_ceiling {
                return Err(CalibError::BlackTooBright {
                    channel,
                    value,
                    limit: self.black_ceiling as f32,
                });
            }
        }
        let ratio = |a: u16, b: u16| if b > 0 { a as f32 / b as f32 } else { 0.0 };
        let worst = ratio(black.x, black.y)
            .max(ratio(black.y, black.z))
            .max(ratio(black.x, black.z));
        if worst > self.black_channel_ratio {
            return Err(CalibError::BlackImbalance {
                ratio: worst,
                limit: self.black_channel_ratio,
            });
        }
        Ok(())
    }
}

/// Integer means of `[X, Y, Z, IR1, IR2]` over the valid captures.
pub fn average_counts(samples: &[RawChannelData]) -> Option<[u16; 5]> {
    let mut sums = [0u64; 5];
    let mut n = 0u64;
    for s in samples.iter().filter(|s| s.valid) {
        for (sum, v) in sums.iter_mut().zip([s.r, s.g, s.b, s.ir, s.ir2]) {
            *sum += u64::from(v);
        }
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(sums.map(|s| (s / n) as u16))
}

/// Something [`CalibrationWorkflow::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Countdown decremented to the given seconds.
    Countdown(u8),
    /// Countdown finished; now in the given scanning state.
    ScanReady(WorkflowState),
    /// Session exceeded its timeout and was cancelled.
    TimedOut,
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStatus {
    /// Current phase.
    pub state: WorkflowState,
    /// Human-readable progress message.
    pub message: String,
    /// Session id while a session exists.
    pub session_id: Option<String>,
    /// `true` between start and completion or cancellation.
    pub in_progress: bool,
    /// Remaining countdown seconds while counting down.
    pub countdown: Option<u8>,
    /// Time since start.
    pub elapsed_ms: u64,
    /// Requested LED brightness.
    pub brightness: u8,
    /// Last failure reason.
    pub error: Option<String>,
    /// Accepted white reference.
    pub white: Option<WhiteCalibration>,
    /// Accepted black reference.
    pub black: Option<BlackCalibration>,
}

/// The calibration session state machine.
#[derive(Debug, Clone, Default)]
pub struct CalibrationWorkflow {
    config: WorkflowConfig,
    state: WorkflowState,
    in_progress: bool,
    session_id: Option<String>,
    message: String,
    last_error: Option<String>,
    brightness: u8,
    started_ms: u64,
    countdown: u8,
    last_countdown_ms: u64,
    white: WhiteCalibration,
    black: BlackCalibration,
}

impl CalibrationWorkflow {
    /// Creates an idle workflow.
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Limits and timing.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Current phase.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// `true` between start and completion or cancellation.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// LED brightness requested for the session.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// White reference collected in this session.
    pub fn white(&self) -> &WhiteCalibration {
        &self.white
    }

    /// Black reference collected in this session.
    pub fn black(&self) -> &BlackCalibration {
        &self.black
    }

    fn transition(&mut self, next: WorkflowState, message: impl Into<String>) {
        let message = message.into();
        info!(from = %self.state, to = %next, %message, "calibration state");
        self.state = next;
        self.message = message;
    }

    fn require(&self, allowed: &[WorkflowState], action: &str) -> CalibResult<()> {
        if !self.in_progress || !allowed.contains(&self.state) {
            warn!(state = %self.state, action, "rejected in current calibration state");
            return Err(CalibError::invalid_state(format!(
                "cannot {action} in state {}",
                self.state
            )));
        }
        Ok(())
    }

    /// Starts a session at the given LED brightness.
    ///
    /// # Errors
    ///
    /// [`Error::CalibrationInProgress`] if a session is running, or
    /// [`Error::InvalidParameter`] for a brightness outside 64..=255.
    pub fn start(&mut self, brightness: u8, now_ms: u64) -> CalibResult<()> {
        if self.in_progress && self.state != WorkflowState::Error {
            warn!("calibration already in progress");
            return Err(Error::CalibrationInProgress.into());
        }
        if !(LED_MIN_BRIGHTNESS..=LED_MAX_BRIGHTNESS).contains(&brightness) {
            return Err(Error::invalid_parameter(format!(
                "brightness {brightness} outside {LED_MIN_BRIGHTNESS}..={LED_MAX_BRIGHTNESS}"
            ))
            .into());
        }

        self.in_progress = true;
        self.brightness = brightness;
        self.started_ms = now_ms;
        self.last_countdown_ms = now_ms;
        self.countdown = self.config.countdown_s;
        self.session_id = Some(format!("cal_{now_ms}"));
        self.last_error = None;
        self.white = WhiteCalibration::default();
        self.black = BlackCalibration::default();
        self.transition(WorkflowState::WhiteCountdown, "Starting white calibration countdown");
        Ok(())
    }

    /// Advances countdowns and enforces the session timeout.
    pub fn tick(&mut self, now_ms: u64) -> Option<WorkflowEvent> {
        if !self.in_progress {
            return None;
        }
        if now_ms.saturating_sub(self.started_ms) > self.config.timeout_ms {
            error!(elapsed_ms = now_ms - self.started_ms, "calibration timed out");
            self.cancel();
            self.message = String::from("Calibration timed out");
            return Some(WorkflowEvent::TimedOut);
        }
        if !self.state.is_countdown()
            || now_ms.saturating_sub(self.last_countdown_ms) < COUNTDOWN_INTERVAL_MS
        {
            return None;
        }

        self.last_countdown_ms = now_ms;
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            self.message = format!("Countdown: {}", self.countdown);
            debug!(countdown = self.countdown, "calibration countdown");
            return Some(WorkflowEvent::Countdown(self.countdown));
        }

        let next = if self.state == WorkflowState::WhiteCountdown {
            self.transition(WorkflowState::WhiteScanning, "Ready for white calibration scan");
            WorkflowState::WhiteScanning
        } else {
            self.transition(WorkflowState::BlackScanning, "Ready for black calibration scan");
            WorkflowState::BlackScanning
        };
        Some(WorkflowEvent::ScanReady(next))
    }

    /// Enters the white scan, skipping any remaining countdown.
    pub fn begin_white_scan(&mut self) -> CalibResult<()> {
        self.require(
            &[WorkflowState::WhiteCountdown, WorkflowState::WhiteScanning],
            "scan white",
        )?;
        self.transition(WorkflowState::WhiteScanning, "Performing white calibration scan");
        Ok(())
    }

    /// Validates and accepts the averaged white reference.
    ///
    /// On rejection the session moves to [`WorkflowState::Error`] and the
    /// specific reason is returned.
    pub fn complete_white_scan(
        &mut self,
        mut white: WhiteCalibration,
        now_ms: u64,
    ) -> CalibResult<WhiteCalibration> {
        self.require(&[WorkflowState::WhiteScanning], "complete white scan")?;
        if let Err(e) = self.config.validate_white(&white) {
            self.fail(format!("White calibration failed: {e}"));
            return Err(e);
        }

        let reference = WhiteReference::from_raw([white.x, white.y, white.z], white.ir);
        white.white_point = reference.white_point;
        white.scaling_factor = reference.scaling_factor;
        white.timestamp_ms = now_ms;
        white.valid = true;
        self.white = white;
        info!(x = white.x, y = white.y, z = white.z, ir = white.ir, "white reference accepted");

        self.transition(WorkflowState::WhiteComplete, "White calibration completed");
        self.transition(WorkflowState::BlackPrompt, "Prepare black reference");
        Ok(white)
    }

    /// User confirmed the black reference is in place.
    pub fn confirm_black(&mut self, now_ms: u64) -> CalibResult<()> {
        self.require(&[WorkflowState::BlackPrompt], "confirm black")?;
        self.countdown = self.config.countdown_s;
        self.last_countdown_ms = now_ms;
        self.transition(WorkflowState::BlackCountdown, "Starting black calibration countdown");
        Ok(())
    }

    /// Enters the black scan, skipping any remaining countdown.
    pub fn begin_black_scan(&mut self) -> CalibResult<()> {
        self.require(
            &[WorkflowState::BlackCountdown, WorkflowState::BlackScanning],
            "scan black",
        )?;
        self.transition(WorkflowState::BlackScanning, "Performing black calibration scan");
        Ok(())
    }

    /// Validates and accepts the averaged black reference.
    pub fn complete_black_scan(
        &mut self,
        mut black: BlackCalibration,
        now_ms: u64,
    ) -> CalibResult<BlackCalibration> {
        self.require(&[WorkflowState::BlackScanning], "complete black scan")?;
        if let Err(e) = self.config.validate_black(&black, Some(&self.white)) {
            self.fail(format!("Black calibration failed: {e}"));
            return Err(e);
        }
        black.timestamp_ms = now_ms;
        black.valid = true;
        self.black = black;
        info!(x = black.x, y = black.y, z = black.z, ir = black.ir, "black reference accepted");
        self.transition(WorkflowState::BlackComplete, "Black calibration completed");
        Ok(black)
    }

    /// Enters the saving phase. Needs at least one accepted reference.
    pub fn begin_save(&mut self) -> CalibResult<()> {
        self.require(
            &[
                WorkflowState::WhiteComplete,
                WorkflowState::BlackPrompt,
                WorkflowState::BlackComplete,
            ],
            "save",
        )?;
        if !self.white.valid && !self.black.valid {
            return Err(CalibError::invalid_state("no calibration data to save"));
        }
        self.transition(WorkflowState::Saving, "Saving calibration data");
        Ok(())
    }

    /// Records the outcome of persisting the references.
    pub fn finish_save(&mut self, outcome: &CalibResult<()>) {
        if self.state != WorkflowState::Saving {
            return;
        }
        match outcome {
            Ok(()) => {
                self.in_progress = false;
                self.transition(
                    WorkflowState::Complete,
                    "Calibration completed and saved successfully",
                );
            }
            Err(e) => self.fail(format!("Failed to save calibration data: {e}")),
        }
    }

    /// Moves to [`WorkflowState::Error`] with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "calibration failed");
        self.last_error = Some(message.clone());
        self.transition(WorkflowState::Error, message);
    }

    /// Abandons the session and discards collected references.
    pub fn cancel(&mut self) {
        if self.in_progress || self.state != WorkflowState::Idle {
            info!(state = %self.state, "calibration cancelled");
        }
        self.in_progress = false;
        self.state = WorkflowState::Idle;
        self.session_id = None;
        self.message.clear();
        self.countdown = 0;
        self.white = WhiteCalibration::default();
        self.black = BlackCalibration::default();
    }

    /// Progress snapshot.
    pub fn status(&self, now_ms: u64) -> WorkflowStatus {
        WorkflowStatus {
            state: self.state,
            message: self.message.clone(),
            session_id: self.session_id.clone(),
            in_progress: self.in_progress,
            countdown: self.state.is_countdown().then_some(self.countdown),
            elapsed_ms: if self.in_progress {
                now_ms.saturating_sub(self.started_ms)
            } else {
                0
            },
            brightness: self.brightness,
            error: self.last_error.clone(),
            white: self.white.valid.then_some(self.white),
            black: self.black.valid.then_some(self.black),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(x: u16, y: u16, z: u16) -> WhiteCalibration {
        WhiteCalibration {
            x,
            y,
            z,
            ir: 3000,
            brightness: 128,
            ..Default::default()
        }
    }

    fn black(x: u16, y: u16, z: u16) -> BlackCalibration {
        BlackCalibration {
            x,
            y,
            z,
            ir: 20,
            ..Default::default()
        }
    }

    fn at_white_scan() -> CalibrationWorkflow {
        let mut wf = CalibrationWorkflow::default();
        wf.start(128, 0).unwrap();
        wf.begin_white_scan().unwrap();
        wf
    }

    #[test]
    fn test_countdown_reaches_scanning() {
        let mut wf = CalibrationWorkflow::default();
        wf.start(128, 0).unwrap();
        assert_eq!(wf.status(0).countdown, Some(3));
        assert_eq!(wf.tick(500), None);
        assert_eq!(wf.tick(1000), Some(WorkflowEvent::Countdown(2)));
        assert_eq!(wf.tick(2000), Some(WorkflowEvent::Countdown(1)));
        assert_eq!(
            wf.tick(3000),
            Some(WorkflowEvent::ScanReady(WorkflowState::WhiteScanning))
        );
        assert_eq!(wf.state(), WorkflowState::WhiteScanning);
        assert_eq!(wf.tick(4000), None);
    }

    #[test]
    fn test_second_start_rejected() {
        let mut wf = CalibrationWorkflow::default();
        wf.start(128, 0).unwrap();
        let err = wf.start(200, 10).unwrap_err();
        assert!(matches!(err.core(), Some(Error::CalibrationInProgress)));
        assert_eq!(wf.brightness(), 128);
    }

    #[test]
    fn test_brightness_range() {
        let mut wf = CalibrationWorkflow::default();
        assert!(wf.start(10, 0).is_err());
        assert!(!wf.is_in_progress());
    }

    #[test]
    fn test_white_rejections_are_distinct() {
        let cfg = WorkflowConfig::default();
        let sat = cfg.validate_white(&white(61000, 50000, 50000)).unwrap_err();
        assert!(matches!(sat.core(), Some(Error::Saturation { channel: Channel::X, .. })));
        let weak = cfg.validate_white(&white(5000, 800, 5000)).unwrap_err();
        assert!(matches!(
            weak.core(),
            Some(Error::InsufficientSignal { channel: Channel::Y, value: 800, .. })
        ));
        let balance = cfg.validate_white(&white(10000, 30000, 10000)).unwrap_err();
        assert!(matches!(balance.core(), Some(Error::PoorWhiteBalance { .. })));
        cfg.validate_white(&white(50000, 52000, 48000)).unwrap();
    }

    #[test]
    fn test_black_validation() {
        let cfg = WorkflowConfig::default();
        let w = WhiteCalibration {
            valid: true,
            ..white(4000, 4000, 4000)
        };
        // 15% of 4000 is 600.
        assert!(matches!(
            cfg.validate_black(&black(700, 300, 300), Some(&w)).unwrap_err(),
            CalibError::BlackTooBright { channel: Channel::X, .. }
        ));
        assert!(matches!(
            cfg.validate_black(&black(300, 1200, 300), None).unwrap_err(),
            CalibError::BlackTooBright { channel: Channel::Y, .. }
        ));
        assert!(matches!(
            cfg.validate_black(&black(400, 100, 100), None).unwrap_err(),
            CalibError::BlackImbalance { .. }
        ));
        cfg.validate_black(&black(300, 320, 280), Some(&w)).unwrap();
        // A zero denominator does not count as imbalance.
        cfg.validate_black(&black(0, 0, 0), Some(&w)).unwrap();
    }

    #[test]
    fn test_full_session() {
        let mut wf = at_white_scan();
        let w = wf.complete_white_scan(white(50000, 52000, 48000), 1500).unwrap();
        assert!(w.valid);
        assert!(w.scaling_factor > 0.0);
        assert_eq!(wf.state(), WorkflowState::BlackPrompt);

        wf.confirm_black(2000).unwrap();
        assert_eq!(wf.state(), WorkflowState::BlackCountdown);
        wf.begin_black_scan().unwrap();
        wf.complete_black_scan(black(300, 320, 280), 2500).unwrap();
        assert_eq!(wf.state(), WorkflowState::BlackComplete);

        wf.begin_save().unwrap();
        wf.finish_save(&Ok(()));
        assert_eq!(wf.state(), WorkflowState::Complete);
        assert!(!wf.is_in_progress());
        let status = wf.status(3000);
        assert!(status.white.is_some());
        assert!(status.black.is_some());
    }

    #[test]
    fn test_cancel_mid_white_scan_clears() {
        let mut wf = at_white_scan();
        wf.cancel();
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(!wf.white().valid);
        assert!(!wf.black().valid);

        // Cancel after a white reference was accepted also discards it.
        let mut wf = at_white_scan();
        wf.complete_white_scan(white(50000, 52000, 48000), 100).unwrap();
        wf.cancel();
        assert!(!wf.white().valid);
        assert!(wf.status(200).session_id.is_none());
    }

    #[test]
    fn test_failed_white_moves_to_error() {
        let mut wf = at_white_scan();
        let err = wf.complete_white_scan(white(500, 500, 500), 100).unwrap_err();
        assert!(err.is_measurement_error());
        assert_eq!(wf.state(), WorkflowState::Error);
        assert!(wf.status(100).error.unwrap().contains("insufficient"));
        // Restart is allowed from the error state.
        wf.start(128, 200).unwrap();
        assert_eq!(wf.state(), WorkflowState::WhiteCountdown);
    }

    #[test]
    fn test_timeout_cancels() {
        let mut wf = at_white_scan();
        wf.complete_white_scan(white(50000, 52000, 48000), 100).unwrap();
        assert_eq!(wf.tick(30_001), Some(WorkflowEvent::TimedOut));
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(!wf.white().valid);
        assert_eq!(wf.status(30_001).message, "Calibration timed out");
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut wf = CalibrationWorkflow::default();
        assert!(wf.begin_white_scan().is_err());
        wf.start(128, 0).unwrap();
        assert!(wf.confirm_black(0).is_err());
        assert!(wf.begin_save().is_err());
        assert!(wf
            .complete_black_scan(black(1, 1, 1), 0)
            .is_err());
    }

    #[test]
    fn test_average_counts() {
        let mut a = RawChannelData::new(100, 200, 300, 40);
        a.ir2 = 10;
        let b = RawChannelData::new(101, 201, 301, 41);
        let avg = average_counts(&[a, b, RawChannelData::invalid(0)]).unwrap();
        assert_eq!(avg, [100, 200, 300, 40, 25]);
        assert!(average_counts(&[]).is_none());
    }
}
