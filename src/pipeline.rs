//! Single-map analysis.
//!
//! masks → {symbols, marker candidates} (side by side) → pressure values →
//! marker finalization → association → report.

use image::{DynamicImage, RgbaImage};
use std::thread;

use crate::config::SpotterConfig;
use crate::connector::connect;
use crate::detect::{
    detect_marker_candidates, detect_symbols, finalize_markers, GlyphClassifier,
    TemplateClassifier,
};
use crate::error::{Result, SpotterError};
use crate::mask::{generate_masks, MaskSet};
use crate::ocr::{extract_values, TextRecognizer};
use crate::records::{PressureValue, Region};
use crate::report::{build_report, render_overlay, MapReport};

/// Decodes encoded image bytes; the error names the map.
pub fn decode_map(name: &str, bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| SpotterError::Decode {
        map: name.to_string(),
        source,
    })
}

/// Output of one analysis.
pub struct MapAnalysis {
    pub report: MapReport,
    /// Intermediate masks, kept for debug output
    pub masks: MaskSet,
    /// Annotated copy of the source, only in debug mode
    pub overlay: Option<RgbaImage>,
}

/// Analysis settings plus the glyph and text strategies.
///
/// Shared read-only between batch workers.
pub struct Analyzer {
    config: SpotterConfig,
    classifier: Box<dyn GlyphClassifier>,
    recognizer: Option<Box<dyn TextRecognizer>>,
}

impl Analyzer {
    /// Template glyph matching, no OCR.
    pub fn new(config: SpotterConfig) -> Self {
        Self {
            config,
            classifier: Box::new(TemplateClassifier::default()),
            recognizer: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn GlyphClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &SpotterConfig {
        &self.config
    }

    /// Decodes and analyzes one map.
    pub fn analyze_bytes(&self, name: &str, bytes: &[u8]) -> Result<MapAnalysis> {
        let image = decode_map(name, bytes)?;
        Ok(self.analyze(name, &image))
    }

    /// Analyzes one decoded map. Never fails: anything unreadable is reported
    /// in the records.
    pub fn analyze(&self, name: &str, image: &DynamicImage) -> MapAnalysis {
        let config = &self.config;
        let classifier: &dyn GlyphClassifier = self.classifier.as_ref();

        let source = image.to_rgba8();
        let luma = image::imageops::grayscale(&source);
        let masks = generate_masks(&source, &config.mask);

        let (symbols, candidates) = thread::scope(|s| {
            let markers = s.spawn(|| {
                detect_marker_candidates(&masks.markers, &config.markers, classifier)
            });
            let symbols = detect_symbols(&masks.symbols, &luma, &config.symbols, classifier);
            let candidates = markers
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (symbols, candidates)
        });

        let pressures: Vec<PressureValue> = match &self.recognizer {
            Some(recognizer) if config.ocr.enabled => {
                extract_values(&luma, &symbols, &config.ocr, recognizer.as_ref())
            }
            _ => Vec::new(),
        };

        let claimed: Vec<Region> = symbols
            .iter()
            .map(|s| s.region)
            .chain(pressures.iter().filter_map(|p| p.text_region))
            .collect();
        let markers = finalize_markers(candidates, &claimed, &config.markers);

        let links = connect(&symbols, &markers, &config.connector);
        let report = build_report(
            name,
            source.dimensions(),
            &symbols,
            &pressures,
            &markers,
            &links,
        );

        log::info!(
            "{}: {} systems, {} markers ({} unlinked)",
            name,
            report.systems.len(),
            report.marker_count(),
            report.unlinked_markers.len()
        );

        let overlay = config.debug.then(|| render_overlay(&source, &report));

        MapAnalysis {
            report,
            masks,
            overlay,
        }
    }
}
