//! # chroma-transfer
//!
//! Transfer functions (OETF/EOTF) for encoding measured colors.
//!
//! # Terminology
//!
//! - **OETF**: Linear -> Encoded ("gamma")
//! - **EOTF**: Encoded -> Linear ("inverse gamma")
//!
//! # Usage
//!
//! ```rust
//! use chroma_transfer::srgb;
//!
//! let linear = srgb::eotf(0.5);
//! let encoded = srgb::oetf(linear);
//! assert!((encoded - 0.5).abs() < 1e-5);
//!
//! assert_eq!(srgb::encode_u8(1.0), 255);
//! ```
//!
//! # Used By
//!
//! - `chroma-color` - XYZ -> sRGB output and sRGB -> LAB for Delta-E

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod srgb;
