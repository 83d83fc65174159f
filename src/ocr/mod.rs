//! Pressure value reading.
//!
//! The extractor crops a window next to each symbol, binarizes it and hands
//! it to a [`TextRecognizer`]. [`TesseractEngine`] is the production
//! recognizer; `setup` finds (or fetches) what it needs at runtime.

pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrWord, TesseractEngine, TextRecognizer};
pub use extract::{extract_pressure, extract_values, select_pressure};
pub use setup::ensure_tessdata;
