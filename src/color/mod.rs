//! Color representation module
//!
//! This module holds the reference color registry and the color space
//! conversions used by the correction pipelines.

pub mod conversion;
pub mod reference;

pub use conversion::ColorConverter;
pub use reference::{lookup, CalibrationColor, ReferenceColor, REFERENCE_COLORS};
