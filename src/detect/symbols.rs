//! L/H symbol detection.

use image::GrayImage;

use super::components::{Component, ComponentMap};
use super::glyph::{Glyph, GlyphClassifier};
use super::{suppress_overlaps, Candidate};
use crate::config::SymbolConfig;
use crate::mask::Mask;
use crate::records::{sort_by_anchor, SymbolKind, SymbolRecord};

/// Outcome of scoring one component against the L and H glyphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Classification {
    Accepted { kind: SymbolKind, score: f32 },
    /// L and H scored exactly the same; never defaulted to either
    Ambiguous { score: f32 },
    /// Best score below the match threshold
    NoMatch { best: f32 },
}

/// Applies the match threshold and tie rule to a pair of glyph scores.
///
/// Close scores still go to the higher one; only an exact tie is rejected.
pub fn classify(low: f32, high: f32, config: &SymbolConfig) -> Classification {
    let best = low.max(high);
    if best < config.match_threshold {
        return Classification::NoMatch { best };
    }
    if low == high {
        return Classification::Ambiguous { score: best };
    }
    let kind = if low > high {
        SymbolKind::Low
    } else {
        SymbolKind::High
    };
    Classification::Accepted { kind, score: best }
}

/// Finds L and H glyphs in the symbol mask.
///
/// `luma` is the grayscale source map, used to check that a component stands
/// out from its surroundings. Records are ordered by anchor (top-to-bottom,
/// left-to-right) and numbered from 1. The mask is not modified.
pub fn detect_symbols(
    mask: &Mask,
    luma: &GrayImage,
    config: &SymbolConfig,
    classifier: &dyn GlyphClassifier,
) -> Vec<SymbolRecord> {
    if mask.is_empty() {
        return Vec::new();
    }

    let map = ComponentMap::from_mask(mask.as_image());
    let mut candidates = Vec::new();

    for component in map.components() {
        if !passes_shape_filter(component, config) {
            continue;
        }

        let contrast = glyph_contrast(&map, component, luma);
        if contrast < config.min_contrast {
            log::debug!(
                "Symbol candidate at {:?} rejected: contrast {:.2}",
                component.region,
                contrast
            );
            continue;
        }

        let patch = map.patch(component);
        let low = classifier.score(&patch, Glyph::Low);
        let high = classifier.score(&patch, Glyph::High);

        match classify(low, high, config) {
            Classification::Accepted { kind, score } => candidates.push(Candidate {
                kind,
                anchor: component.centroid(),
                region: component.region,
                confidence: score,
            }),
            Classification::Ambiguous { score } => {
                log::debug!(
                    "Symbol candidate at {:?} is ambiguous (L/H both {:.2})",
                    component.region,
                    score
                );
            }
            Classification::NoMatch { .. } => {}
        }
    }

    let mut accepted = suppress_overlaps(candidates);
    sort_by_anchor(&mut accepted, |c| c.anchor);

    let symbols: Vec<SymbolRecord> = accepted
        .into_iter()
        .zip(1u32..)
        .map(|(c, id)| SymbolRecord {
            id,
            kind: c.kind,
            anchor: c.anchor,
            region: c.region,
            confidence: c.confidence,
        })
        .collect();

    log::debug!("Detected {} symbols", symbols.len());
    symbols
}

fn passes_shape_filter(component: &Component, config: &SymbolConfig) -> bool {
    let r = component.region;
    let aspect = component.aspect_ratio();
    component.area >= config.min_area
        && component.area <= config.max_area
        && r.width.max(r.height) >= config.min_size
        && r.width.max(r.height) <= config.max_size
        && aspect >= config.min_aspect
        && aspect <= config.max_aspect
}

/// Mean luma difference between glyph pixels and the rest of a slightly
/// padded box around it, scaled to 0.0-1.0.
fn glyph_contrast(map: &ComponentMap, component: &Component, luma: &GrayImage) -> f32 {
    let r = component
        .region
        .padded(2)
        .clamp_to(luma.width(), luma.height());

    let (mut fg_sum, mut fg_n) = (0u64, 0u64);
    let (mut bg_sum, mut bg_n) = (0u64, 0u64);
    for y in r.y..r.bottom() {
        for x in r.x..r.right() {
            let v = luma.get_pixel(x, y)[0] as u64;
            if map.label_at(x, y) == component.label {
                fg_sum += v;
                fg_n += 1;
            } else {
                bg_sum += v;
                bg_n += 1;
            }
        }
    }

    if fg_n == 0 || bg_n == 0 {
        return 0.0;
    }
    let fg = fg_sum as f32 / fg_n as f32;
    let bg = bg_sum as f32 / bg_n as f32;
    (fg - bg).abs() / 255.0
}
