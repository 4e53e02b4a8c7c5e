//! Error types for the colorimeter pipeline.
//!
//! # Overview
//!
//! The [`Error`] enum names every failure the pipeline distinguishes:
//! - Sensor transport failures (retryable)
//! - Measurement validation failures (saturation, weak signal, white balance)
//! - Calibration data failures (bad matrices, too few points, singular fits)
//! - Persistence failures
//!
//! Transport failures are retried locally before surfacing. Validation
//! failures abort the current operation and report a specific reason.
//!
//! # Usage
//!
//! ```rust
//! use chroma_core::{Channel, Error, Result};
//!
//! fn check(value: u16) -> Result<u16> {
//!     if value >= 65000 {
//!         return Err(Error::Saturation { channel: Channel::Y, value });
//!     }
//!     Ok(value)
//! }
//!
//! assert!(check(65535).unwrap_err().is_measurement_error());
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - For derive macro error implementation
//!
//! # Used By
//!
//! - `chroma-sensor` - Reader and controller failures
//! - `chroma-color` - Matrix validation
//! - `chroma-calib` - Fitting, persistence and workflow failures

use crate::channel::Channel;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the measurement and calibration pipeline.
///
/// # Categories
///
/// - **Transport**: [`SensorNotInitialized`](Error::SensorNotInitialized),
///   [`TransportReadFailed`](Error::TransportReadFailed), [`AutoZeroFailed`](Error::AutoZeroFailed)
/// - **Measurement**: [`Saturation`](Error::Saturation), [`InsufficientSignal`](Error::InsufficientSignal),
///   [`PoorWhiteBalance`](Error::PoorWhiteBalance)
/// - **Calibration data**: [`InvalidMatrix`](Error::InvalidMatrix),
///   [`InsufficientCalibrationData`](Error::InsufficientCalibrationData), [`SingularSystem`](Error::SingularSystem)
/// - **Persistence**: [`StorageFailed`](Error::StorageFailed)
/// - **Session**: [`CalibrationInProgress`](Error::CalibrationInProgress), [`InvalidState`](Error::InvalidState)
#[derive(Debug, Error)]
pub enum Error {
    /// The sensor has not been brought up or stopped responding.
    #[error("sensor not initialized")]
    SensorNotInitialized,

    /// A channel read failed after every retry.
    #[error("transport read of channel {channel} failed after {attempts} attempts")]
    TransportReadFailed {
        /// Channel being read
        channel: Channel,
        /// Attempts made
        attempts: u8,
    },

    /// A channel is saturated.
    #[error("channel {channel} saturated at {value}")]
    Saturation {
        /// Offending channel
        channel: Channel,
        /// Measured count
        value: u16,
    },

    /// A channel is below the usable signal floor.
    #[error("insufficient signal on channel {channel}: {value} < {minimum}")]
    InsufficientSignal {
        /// Offending channel
        channel: Channel,
        /// Measured count
        value: u16,
        /// Required minimum
        minimum: u16,
    },

    /// A matrix contains NaN/Inf or has the wrong shape.
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    /// Persistent storage rejected a read or write.
    #[error("storage failed: {0}")]
    StorageFailed(String),

    /// The sensor rejected the auto-zero configuration.
    #[error("auto-zero failed: {0}")]
    AutoZeroFailed(String),

    /// Too few reference points for a matrix fit.
    #[error("insufficient calibration data: {have} points, need {need}")]
    InsufficientCalibrationData {
        /// Points available
        have: usize,
        /// Points required
        need: usize,
    },

    /// White reference channels are too unbalanced.
    #[error("poor white balance: channel ratio {ratio:.2} exceeds {limit:.2}")]
    PoorWhiteBalance {
        /// Measured max/min ratio
        ratio: f32,
        /// Allowed ratio
        limit: f32,
    },

    /// The normal equations of a fit are singular.
    #[error("singular system: pivot below tolerance")]
    SingularSystem,

    /// A calibration session is already running.
    #[error("calibration already in progress")]
    CalibrationInProgress,

    /// Operation not permitted in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Creates an [`Error::InvalidMatrix`] error.
    #[inline]
    pub fn invalid_matrix(msg: impl Into<String>) -> Self {
        Self::InvalidMatrix(msg.into())
    }

    /// Creates an [`Error::StorageFailed`] error.
    #[inline]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageFailed(msg.into())
    }

    /// Creates an [`Error::InvalidState`] error.
    #[inline]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates an [`Error::InsufficientCalibrationData`] error.
    #[inline]
    pub fn insufficient_points(have: usize, need: usize) -> Self {
        Self::InsufficientCalibrationData { have, need }
    }

    /// Returns `true` for transient transport failures worth retrying.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportReadFailed { .. })
    }

    /// Returns `true` if the error describes a bad measurement.
    #[inline]
    pub fn is_measurement_error(&self) -> bool {
        matches!(
            self,
            Self::Saturation { .. } | Self::InsufficientSignal { .. } | Self::PoorWhiteBalance { .. }
        )
    }

    /// Returns `true` if the error concerns calibration data.
    #[inline]
    pub fn is_calibration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMatrix(_) | Self::InsufficientCalibrationData { .. } | Self::SingularSystem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_retryable() {
        let err = Error::TransportReadFailed {
            channel: Channel::Z,
            attempts: 3,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Z"));
        assert!(!Error::SensorNotInitialized.is_retryable());
    }

    #[test]
    fn test_measurement_reasons_are_distinct() {
        let sat = Error::Saturation {
            channel: Channel::X,
            value: 61000,
        };
        let weak = Error::InsufficientSignal {
            channel: Channel::Y,
            value: 200,
            minimum: 1000,
        };
        let balance = Error::PoorWhiteBalance {
            ratio: 3.1,
            limit: 2.5,
        };
        for err in [&sat, &weak, &balance] {
            assert!(err.is_measurement_error());
        }
        assert!(sat.to_string().contains("saturated"));
        assert!(weak.to_string().contains("insufficient"));
        assert!(balance.to_string().contains("3.10"));
    }

    #[test]
    fn test_calibration_errors() {
        assert!(Error::insufficient_points(3, 4).is_calibration_error());
        assert!(Error::invalid_matrix("NaN at [1][2]").is_calibration_error());
        assert!(Error::SingularSystem.is_calibration_error());
        assert!(!Error::storage("full").is_calibration_error());
    }
}
