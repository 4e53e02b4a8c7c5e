//! # chroma-calib
//!
//! Calibration data and the calibration session for the colorimeter.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CalibrationStore                        │
//! │  low-IR matrix ─┐                                            │
//! │                 ├─ smoothstep blend by IR ratio ─> sRGB      │
//! │  high-IR matrix ┘                                            │
//! │  reference points ─> least-squares fit ─> evaluation (ΔE)    │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ save / load
//!                    ┌────────▼────────┐
//!                    │  KeyValueStore  │  MemoryStore | FileStore (YAML)
//!                    └────────▲────────┘
//!                             │ white/black references
//! ┌───────────────────────────┴──────────────────────────────────┐
//! │  CalibrationWorkflow  Idle -> White... -> Black... -> Saving │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use chroma_calib::{CalibrationStore, MemoryStore};
//! use chroma_core::RawChannelData;
//!
//! let mut kv = MemoryStore::new();
//! let mut store = CalibrationStore::new();
//! if !store.load(&kv).unwrap() {
//!     store.load_factory_defaults();
//! }
//! let rgb = store
//!     .apply_calibrated_conversion(&RawChannelData::new(20000, 21000, 19000, 1500))
//!     .unwrap();
//! assert!(rgb.iter().any(|&c| c > 0));
//! store.save(&mut kv, 0).unwrap();
//! ```
//!
//! # Dependencies
//!
//! - [`chroma-color`] - Matrices, blending, Delta-E
//! - [`chroma-math`] - Least-squares normal equations
//! - [`serde_yaml`] - File-backed store
//! - [`serde_json`] - Calibration export
//!
//! # Used By
//!
//! - `chroma-device` - Scan pipeline and calibration API

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod kv;
pub mod persist;
pub mod references;
pub mod store;
pub mod workflow;

pub use error::{CalibError, CalibResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore, StoredValue};
pub use persist::{load_references, save_references};
pub use references::{ReferencePoint, COLOR_CHECKER, MAX_REFERENCE_POINTS, MIN_FIT_POINTS, PRIMARIES};
pub use store::{CalibrationStats, CalibrationStore};
pub use workflow::{
    average_counts, CalibrationWorkflow, WorkflowConfig, WorkflowEvent, WorkflowState,
    WorkflowStatus,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CalibError, CalibResult};
    pub use crate::kv::KeyValueStore;
    pub use crate::store::CalibrationStore;
    pub use crate::workflow::{CalibrationWorkflow, WorkflowState};
}
