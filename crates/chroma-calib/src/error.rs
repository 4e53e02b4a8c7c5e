//! Error types for calibration storage, fitting and the workflow.
//!
//! Pipeline errors from `chroma-core` are wrapped unchanged in
//! [`CalibError::Core`], so a white-scan rejection still reports which of
//! saturation, weak signal or white balance caused it.

use chroma_core::{Channel, Error};
use thiserror::Error;

/// Result type for calibration operations.
pub type CalibResult<T> = Result<T, CalibError>;

/// Errors that can occur during calibration.
#[derive(Debug, Error)]
pub enum CalibError {
    /// Pipeline error (matrix, measurement, fit, state).
    #[error(transparent)]
    Core(#[from] Error),

    /// I/O error on a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error on a file-backed store.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON export error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Black reference reads too much light on a channel.
    #[error("black reference channel {channel} reads {value}, above {limit:.0}")]
    BlackTooBright {
        /// Offending channel.
        channel: Channel,
        /// Averaged count.
        value: u16,
        /// Allowed maximum.
        limit: f32,
    },

    /// Black reference channels are implausibly unbalanced.
    #[error("black reference channel ratio {ratio:.2} exceeds {limit:.2}")]
    BlackImbalance {
        /// Largest pairwise ratio.
        ratio: f32,
        /// Allowed ratio.
        limit: f32,
    },

    /// Reference set is at capacity.
    #[error("reference set full ({capacity} points)")]
    ReferenceSetFull {
        /// Maximum number of points.
        capacity: usize,
    },

    /// Reference index out of range.
    #[error("no reference point {index} ({count} loaded)")]
    NoSuchReference {
        /// Requested index.
        index: usize,
        /// Points loaded.
        count: usize,
    },

    /// A reference capture is outside the usable count window.
    #[error("reference '{name}' channel {channel} reads {value}, outside {min}..={max}")]
    ReferenceOutOfRange {
        /// Reference name.
        name: String,
        /// Offending channel.
        channel: Channel,
        /// Measured count.
        value: u16,
        /// Lowest accepted count.
        min: u16,
        /// Highest accepted count.
        max: u16,
    },
}

impl CalibError {
    /// Creates a [`CalibError::Core`] storage error.
    #[inline]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Core(Error::storage(msg))
    }

    /// Creates a [`CalibError::Core`] invalid-state error.
    #[inline]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::Core(Error::invalid_state(msg))
    }

    /// The wrapped pipeline error, if any.
    pub fn core(&self) -> Option<&Error> {
        match self {
            Self::Core(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if a reference measurement was rejected.
    pub fn is_measurement_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_measurement_error(),
            Self::BlackTooBright { .. }
            | Self::BlackImbalance { .. }
            | Self::ReferenceOutOfRange { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if persistent storage failed.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Yaml(_) | Self::Json(_) | Self::Core(Error::StorageFailed(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_passthrough() {
        let err: CalibError = Error::PoorWhiteBalance {
            ratio: 3.0,
            limit: 2.5,
        }
        .into();
        assert!(err.is_measurement_error());
        assert!(matches!(err.core(), Some(Error::PoorWhiteBalance { .. })));
        assert!(err.to_string().contains("poor white balance"));
    }

    #[test]
    fn test_storage_predicate() {
        assert!(CalibError::storage("flash full").is_storage_error());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(CalibError::from(io).is_storage_error());
        assert!(!CalibError::ReferenceSetFull { capacity: 12 }.is_storage_error());
    }

    #[test]
    fn test_black_errors_are_measurement() {
        let err = CalibError::BlackTooBright {
            channel: Channel::Y,
            value: 1500,
            limit: 1000.0,
        };
        assert!(err.is_measurement_error());
        assert!(err.to_string().contains("1500"));
    }
}
