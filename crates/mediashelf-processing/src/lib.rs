//! Mediashelf Processing Library
//!
//! This crate provides the conversion registry (named image-to-image functions), the
//! image manipulator that writes derived artifacts next to the original, and mime helpers.

pub mod conversion;
pub mod manipulator;
pub mod mime;

// Re-export commonly used types
pub use conversion::{ConversionFn, ConversionRegistry};
pub use manipulator::{ConversionFailure, ConversionReport, ImageManipulator};
pub use mime::{guess_mime_type, image_format_for};
