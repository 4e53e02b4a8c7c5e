//! # chroma-color
//!
//! Colorimetric conversion for the colorimeter pipeline.
//!
//! This crate turns raw sensor channels into display colour:
//!
//! - **Calibration matrices** - [`CalibrationMatrix`], factory tables, validation
//! - **IR blending** - Smoothstep blend of low-IR and high-IR matrices
//! - **Conversion** - Matrix application, XYZ to 8-bit sRGB, naive fallback
//! - **Normalisation** - Two-point (white + black) and white-balance paths
//! - **Delta-E** - Euclidean sRGB and CIE76 L\*a\*b\*
//! - **CIE extras** - xyY, correlated colour temperature, white references
//!
//! # Architecture
//!
//! ```text
//!                 chroma-color
//!                      |
//!        +-------------+-------------+
//!        |             |             |
//! chroma-transfer  chroma-math       |
//!        |             |             |
//!        +------+------+             |
//!               |                    |
//!          chroma-core --------------+
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use chroma_color::{CalibrationMatrix, MatrixType};
//! use chroma_core::RawChannelData;
//!
//! let m = CalibrationMatrix::factory(MatrixType::LowIr);
//! let raw = RawChannelData::new(20000, 21000, 19000, 2000);
//! let xyz = m.apply_raw(&raw).unwrap();
//! let rgb = m.kind.to_srgb(xyz);
//! assert!(rgb.iter().all(|&c| c > 0));
//! ```
//!
//! # Dependencies
//!
//! - [`chroma-core`] - Raw captures, references, errors
//! - [`chroma-math`] - `Mat3`, `Mat4`, smoothstep
//! - [`chroma-transfer`] - sRGB transfer function
//!
//! # Used By
//!
//! - `chroma-calib` - Matrix storage, fitting and evaluation
//! - `chroma-device` - Scan conversion

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod blend;
pub mod cie;
pub mod convert;
pub mod delta_e;
pub mod matrix;
pub mod normalize;

pub use blend::{apply_smooth_step_blending, ir_ratio, IrThresholds};
pub use cie::{correlated_color_temperature, xyz_to_xyy, WhiteReference, Xyy};
pub use convert::{apply_color_matrix, display_to_srgb, naive_srgb, xyz_to_linear_srgb, xyz_to_srgb};
pub use delta_e::{delta_e, delta_e_lab, delta_e_rgb, srgb_to_lab, DeltaEMethod};
pub use matrix::{validate_matrix, CalibrationMatrix, MatrixKind, MatrixType};
pub use normalize::{prepare_channels, two_point, white_balance, CalibrationMode};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::blend::IrThresholds;
    pub use crate::delta_e::DeltaEMethod;
    pub use crate::matrix::{CalibrationMatrix, MatrixKind, MatrixType};
    pub use crate::normalize::CalibrationMode;
}
