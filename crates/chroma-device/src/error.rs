//! Error types for the colorimeter orchestrator.

use chroma_calib::CalibError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced by [`Colorimeter`](crate::Colorimeter).
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Sensor, conversion or session error.
    #[error(transparent)]
    Core(#[from] chroma_core::Error),

    /// Calibration storage, fit or workflow error.
    #[error(transparent)]
    Calib(#[from] CalibError),

    /// Config file not found.
    #[error("config not found: {path}")]
    ConfigNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Config value out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error in a config file.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Sample index out of range.
    #[error("no sample {index} ({count} stored)")]
    NoSuchSample {
        /// Requested index, newest first.
        index: usize,
        /// Samples stored.
        count: usize,
    },

    /// The paint-match service failed.
    #[error("paint match failed: {0}")]
    PaintMatch(String),
}

impl DeviceError {
    /// Creates an invalid config error.
    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a paint-match error.
    #[inline]
    pub fn paint_match(msg: impl Into<String>) -> Self {
        Self::PaintMatch(msg.into())
    }

    /// The underlying pipeline error, if any.
    pub fn core(&self) -> Option<&chroma_core::Error> {
        match self {
            Self::Core(e) => Some(e),
            Self::Calib(e) => e.core(),
            _ => None,
        }
    }

    /// `true` for sensor transport failures.
    pub fn is_transport_error(&self) -> bool {
        self.core().is_some_and(|e| {
            e.is_retryable() || matches!(e, chroma_core::Error::SensorNotInitialized)
        })
    }

    /// `true` for config loading and validation failures.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::InvalidConfig(_) | Self::Io(_) | Self::Yaml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::{Channel, Error};

    #[test]
    fn test_core_through_calib() {
        let e: DeviceError = CalibError::from(Error::CalibrationInProgress).into();
        assert!(matches!(e.core(), Some(Error::CalibrationInProgress)));
        assert!(!e.is_transport_error());
    }

    #[test]
    fn test_transport_predicate() {
        let e = DeviceError::from(Error::TransportReadFailed {
            channel: Channel::Y,
            attempts: 3,
        });
        assert!(e.is_transport_error());
        assert!(DeviceError::from(Error::SensorNotInitialized).is_transport_error());
        assert!(DeviceError::invalid_config("x").is_config_error());
    }
}
