//! # chroma-math
//!
//! Math utilities for colorimetric calibration.
//!
//! This crate provides the numeric primitives the pipeline is built on:
//!
//! - [`Mat3`] - 3x3 matrices for fixed XYZ/RGB transforms
//! - [`Mat4`] - 4x4 calibration matrices mapping `[R, G, B, IR]` to `[X, Y, Z, 1]`
//! - [`solve_linear`], [`LeastSquares`] - Gaussian elimination and normal equations
//! - [`smoothstep`] and friends - Interpolation used for IR blending
//! - [`SampleStats`] - Mean, deviation, CV and outlier counting
//!
//! # Design
//!
//! Matrices are stored **row-major** and multiply **column vectors**:
//!
//! ```text
//! result = matrix * vector
//! ```
//!
//! # Usage
//!
//! ```rust
//! use chroma_math::{Mat4, smoothstep};
//!
//! let m = Mat4::IDENTITY;
//! assert_eq!(m.transform([1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0, 4.0]);
//! assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
//! ```
//!
//! # Dependencies
//!
//! - [`chroma-core`] - Error types
//!
//! # Used By
//!
//! - `chroma-color` - Matrix application and color conversions
//! - `chroma-sensor` - Quality statistics
//! - `chroma-calib` - Least-squares matrix fitting

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod interp;
mod mat3;
mod mat4;
mod solve;
mod stats;

pub use interp::*;
pub use mat3::*;
pub use mat4::*;
pub use solve::*;
pub use stats::*;
