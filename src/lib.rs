//! Pressure Spotter
//!
//! Finds the L (low) and H (high) pressure symbols and the X position
//! markers on synoptic weather map images, reads the central pressure
//! printed beside each symbol and links every marker to its system.
//!
//! ```no_run
//! use pressure_spotter::{Analyzer, SpotterConfig};
//!
//! let analyzer = Analyzer::new(SpotterConfig::default());
//! let bytes = std::fs::read("0600_UTC_Wed_03_JAN.gif").unwrap();
//! let analysis = analyzer.analyze_bytes("0600_UTC_Wed_03_JAN", &bytes).unwrap();
//! for system in &analysis.report.systems {
//!     let anchor = system.symbol.anchor;
//!     println!("{} at ({}, {})", system.symbol.kind, anchor.x, anchor.y);
//! }
//! ```

pub mod batch;
pub mod config;
pub mod connector;
pub mod detect;
pub mod error;
pub mod mask;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod records;
pub mod report;

pub use batch::{run_batch, MapInput, MapOutcome};
pub use config::SpotterConfig;
pub use connector::{connect, Links};
pub use error::{Result, SpotterError};
pub use pipeline::{Analyzer, MapAnalysis};
pub use records::{
    MarkerRecord, PixelPoint, PressureValue, Region, SymbolKind, SymbolRecord, SystemRecord,
};
pub use report::{build_report, MapReport};
