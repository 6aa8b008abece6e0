//! Command-line entry points.

pub mod languages;
pub mod ocr;
