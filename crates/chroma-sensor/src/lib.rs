//! # chroma-sensor
//!
//! Sensor-side control for the colorimeter.
//!
//! - [`RawChannelReader`] - Channel reads with bounded retries and saturation checks
//! - [`DynamicSensorController`] - Lighting tiers, gain/integration fine control,
//!   LED brightness search
//! - [`QualityEngine`] - Multi-sample averaging and 0..100 quality scores
//! - [`AmbientFlag`] - Interrupt-to-loop event flag
//! - [`hal`] - Capability traits the hardware layer implements
//! - [`sim`] - A simulated rig implementing those traits
//!
//! # Data Flow
//!
//! ```text
//! SensorTransport -> RawChannelReader -> DynamicSensorController
//!                                     -> QualityEngine -> averaged capture
//! ```
//!
//! Components hold no reference to each other. The reader is passed by
//! `&mut` into every controller and engine call, so one owner (the device
//! orchestrator) decides the order of bus transactions.
//!
//! # Usage
//!
//! ```rust
//! use chroma_sensor::{QualityEngine, sim::{SceneState, SimRig}};
//!
//! let rig = SimRig::new(SceneState {
//!     ambient: [30000.0, 30000.0, 30000.0, 1000.0],
//!     ..SceneState::dark()
//! });
//! let mut reader = rig.reader();
//! let reading = QualityEngine::default().perform_quality_reading(&mut reader).unwrap();
//! assert_eq!(reading.quality.quality_score, 100);
//! ```
//!
//! # Dependencies
//!
//! - [`chroma-core`] - Captures, sensor configuration, errors
//! - [`chroma-math`] - Sample statistics
//!
//! # Used By
//!
//! - `chroma-device` - Scan orchestration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ambient;
pub mod controller;
pub mod hal;
pub mod led;
pub mod quality;
pub mod reader;
pub mod sim;

pub use ambient::AmbientFlag;
pub use controller::{Adjustment, ControllerConfig, DynamicSensorController, PRESETS};
pub use hal::{Clock, Illumination, NoWatchdog, SensorTransport, SystemClock, Watchdog};
pub use led::{LedOptimizerConfig, LedOutcome};
pub use quality::{QualityConfig, QualityEngine, QualityLevel, QualityReading, ReadingQuality};
pub use reader::{RawChannelReader, ReaderConfig};
