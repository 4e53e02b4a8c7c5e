//! # chroma-core
//!
//! Core types for the colorimeter measurement and calibration pipeline.
//!
//! This crate provides the foundational data model shared by every other
//! crate in the workspace:
//!
//! - [`Channel`] - Physical sensor channels (X, Y, Z, IR1, IR2)
//! - [`RawChannelData`] - One captured set of raw 16-bit counts
//! - [`SensorConfig`], [`Gain`], [`LightingCondition`] - Live sensor state
//! - [`WhiteCalibration`], [`BlackCalibration`] - Single-point references
//! - [`Error`] - The error taxonomy used across the pipeline
//!
//! ## Crate Structure
//!
//! This crate has no internal dependencies. All other crates depend on it:
//!
//! ```text
//! chroma-core (this crate)
//!    ^
//!    |
//!    +-- chroma-math (matrices, least squares, statistics)
//!    +-- chroma-transfer (sRGB transfer function)
//!    +-- chroma-color (matrix application, XYZ -> sRGB, Delta-E)
//!    +-- chroma-sensor (reader, controller, quality engine)
//!    +-- chroma-calib (calibration store, workflow)
//!    +-- chroma-device (orchestrator)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod config;
pub mod error;
pub mod reference;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use reference::*;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use chroma_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::channel::{Channel, RawChannelData};
    pub use crate::config::{Gain, LightingCondition, SensorConfig};
    pub use crate::error::{Error, Result};
    pub use crate::reference::{BlackCalibration, WhiteCalibration};
}
