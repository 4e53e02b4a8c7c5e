//! # chroma-device
//!
//! The colorimeter as one owned object.
//!
//! [`Colorimeter`] wires the sensor reader, the dynamic sensor controller,
//! the LED optimiser, the quality engine, the calibration store and the
//! calibration workflow together, and adds what only makes sense at device
//! level: the scan pipeline, continuous scans, saved samples with paint
//! matching, diagnostics and the main-loop tick.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── Colorimeter ────────────────────────────┐
//! │  RawChannelReader ── DynamicSensorController ── QualityEngine       │
//! │         │                      │ LED search                         │
//! │   SensorTransport         Illumination          Watchdog   Clock    │
//! │                                                                     │
//! │  CalibrationStore ── CalibrationWorkflow ── white/black references  │
//! │         │                                                           │
//! │   KeyValueStore            SampleBuffer ── PaintMatcher (optional)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use chroma_calib::MemoryStore;
//! use chroma_device::{Colorimeter, DeviceConfig, Peripherals};
//! use chroma_sensor::sim::{SceneState, SimRig};
//! use std::rc::Rc;
//!
//! let rig = SimRig::new(SceneState::white_tile());
//! let hw = Peripherals {
//!     transport: Box::new(rig.transport()),
//!     illumination: Box::new(rig.illumination()),
//!     clock: Rc::new(rig.clock()),
//!     watchdog: Box::new(rig.watchdog()),
//!     storage: Box::new(MemoryStore::new()),
//! };
//! let mut device = Colorimeter::new(DeviceConfig::default(), hw);
//! device.initialize().unwrap();
//!
//! let scan = device.perform_scan().unwrap();
//! device.save_sample(scan.rgb).unwrap();
//! assert_eq!(device.sample_count(), 1);
//! ```
//!
//! With the `sim` feature, `Peripherals::simulated` builds the same set
//! from a rig in one call.
//!
//! # Dependencies
//!
//! - [`chroma-sensor`] - Reader, controller, quality engine, simulated rig
//! - [`chroma-calib`] - Calibration store, persistence, workflow
//! - [`chroma-color`] - Normalisation and conversion
//! - [`serde_yaml`] - Device configuration
//!
//! # Used By
//!
//! - `chroma-cli` - Command-line front end

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod colorimeter;
pub mod config;
pub mod error;
pub mod samples;
pub mod scan;

pub use colorimeter::{Colorimeter, Diagnostics, Peripherals, ReferenceSet, TickReport, INDICATOR_BRIGHTNESS};
pub use config::{ContinuousScanConfig, DeviceConfig, SensorDefaults};
pub use error::{DeviceError, DeviceResult};
pub use samples::{ColorSample, PaintMatch, PaintMatcher, SampleBuffer};
pub use scan::{ChannelSpread, Consistency, ContinuousScan, ScanResult};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::colorimeter::{Colorimeter, Peripherals};
    pub use crate::config::DeviceConfig;
    pub use crate::error::{DeviceError, DeviceResult};
    pub use crate::scan::ScanResult;
}
