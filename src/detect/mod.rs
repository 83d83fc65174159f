//! Glyph detection over binary masks.
//!
//! This module provides:
//! - Connected-component extraction
//! - Pluggable glyph scoring (template correlation by default)
//! - The L/H symbol detector and the X marker detector

pub mod components;
pub mod glyph;
pub mod markers;
pub mod symbols;

pub use glyph::{Glyph, GlyphClassifier, GlyphPatch, TemplateClassifier};
pub use markers::{detect_marker_candidates, detect_markers, finalize_markers};
pub use symbols::{classify, detect_symbols, Classification};

use crate::records::{PixelPoint, Region};

/// An accepted component before ids are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate<K> {
    pub kind: K,
    pub anchor: PixelPoint,
    pub region: Region,
    pub confidence: f32,
}

/// Keeps the most confident candidates whose regions do not overlap.
///
/// Candidates are visited by descending confidence; on equal confidence the
/// earlier one wins, so the result only depends on the input order.
pub(crate) fn suppress_overlaps<K>(candidates: Vec<Candidate<K>>) -> Vec<Candidate<K>> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .confidence
            .total_cmp(&candidates[a].confidence)
            .then(a.cmp(&b))
    });

    let mut keep = vec![false; candidates.len()];
    let mut kept_regions: Vec<Region> = Vec::new();
    for index in order {
        let region = candidates[index].region;
        if kept_regions.iter().any(|r| r.intersects(&region)) {
            continue;
        }
        kept_regions.push(region);
        keep[index] = true;
    }

    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, c)| keep[index].then_some(c))
        .collect()
}
