//! X marker detection.

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use super::components::ComponentMap;
use super::glyph::{Glyph, GlyphClassifier};
use super::{suppress_overlaps, Candidate};
use crate::config::{MarkerConfig, SensitivePass};
use crate::mask::Mask;
use crate::records::{sort_by_anchor, MarkerRecord, PixelPoint, Region, SymbolRecord};

/// Finds X markers in the marker mask.
///
/// Markers that fall on an accepted symbol (padded by
/// `config.claim_padding`) are dropped, so no marker region ever overlaps a
/// symbol region.
pub fn detect_markers(
    mask: &Mask,
    symbols: &[SymbolRecord],
    config: &MarkerConfig,
    classifier: &dyn GlyphClassifier,
) -> Vec<MarkerRecord> {
    let candidates = detect_marker_candidates(mask, config, classifier);
    let claimed: Vec<Region> = symbols.iter().map(|s| s.region).collect();
    finalize_markers(candidates, &claimed, config)
}

/// Shape filtering, X scoring, the optional sensitive pass and fragment
/// merging.
///
/// Independent of symbol detection, so the two can run side by side.
pub fn detect_marker_candidates(
    mask: &Mask,
    config: &MarkerConfig,
    classifier: &dyn GlyphClassifier,
) -> Vec<Candidate<()>> {
    if mask.is_empty() {
        return Vec::new();
    }

    let (width, height) = (mask.width(), mask.height());
    let map = ComponentMap::from_mask(mask.as_image());
    let mut accepted = Vec::new();

    for component in map.components() {
        if component.area < config.min_area || component.area > config.max_area {
            continue;
        }
        let aspect = component.aspect_ratio();
        if aspect < config.min_aspect || aspect > config.max_aspect {
            continue;
        }
        let fill = component.fill_ratio();
        if fill < config.min_fill || fill > config.max_fill {
            continue;
        }

        let anchor = component.centroid();
        if near_border(anchor, width, height, config.border_margin) {
            continue;
        }

        let score = classifier.score(&map.patch(component), Glyph::Cross);
        if score < config.match_threshold {
            continue;
        }

        accepted.push(Candidate {
            kind: (),
            anchor,
            region: component.region,
            confidence: score,
        });
    }

    if config.sensitive.enabled {
        let extra = sensitive_candidates(mask, &accepted, &config.sensitive, classifier);
        log::debug!("Sensitive pass added {} marker candidates", extra.len());
        accepted.extend(extra);
    }

    merge_fragments(accepted, config.merge_distance)
}

/// Blurs and re-thresholds the mask, then keeps small components that no
/// earlier candidate already covers. The X score is kept as confidence but
/// not thresholded.
fn sensitive_candidates(
    mask: &Mask,
    found: &[Candidate<()>],
    pass: &SensitivePass,
    classifier: &dyn GlyphClassifier,
) -> Vec<Candidate<()>> {
    if pass.blur_sigma <= 0.0 {
        log::warn!("Sensitive marker pass skipped: blur_sigma must be positive");
        return Vec::new();
    }

    let (width, height) = (mask.width(), mask.height());
    let blurred = gaussian_blur_f32(mask.as_image(), pass.blur_sigma);
    let binary = GrayImage::from_fn(width, height, |x, y| {
        Luma([if blurred.get_pixel(x, y)[0] > pass.threshold { 255 } else { 0 }])
    });

    let map = ComponentMap::from_mask(&binary);
    let mut taken: Vec<PixelPoint> = found.iter().map(|c| c.anchor).collect();
    let mut extra = Vec::new();

    for component in map.components() {
        if component.area < pass.min_area || component.area > pass.max_area {
            continue;
        }
        let aspect = component.aspect_ratio();
        if aspect < pass.min_aspect || aspect > pass.max_aspect {
            continue;
        }

        let anchor = component.centroid();
        if near_border(anchor, width, height, pass.border_margin) {
            continue;
        }
        if taken
            .iter()
            .any(|p| p.distance_to(&anchor) < pass.duplicate_distance)
        {
            continue;
        }

        taken.push(anchor);
        extra.push(Candidate {
            kind: (),
            anchor,
            region: component.region,
            confidence: classifier.score(&map.patch(component), Glyph::Cross),
        });
    }

    extra
}

/// Drops candidates touching a claimed region (symbol glyphs, pressure
/// text), resolves overlaps and assigns ids.
pub fn finalize_markers(
    candidates: Vec<Candidate<()>>,
    claimed: &[Region],
    config: &MarkerConfig,
) -> Vec<MarkerRecord> {
    let claimed: Vec<Region> = claimed
        .iter()
        .map(|r| r.padded(config.claim_padding))
        .collect();

    let free: Vec<Candidate<()>> = candidates
        .into_iter()
        .filter(|c| !claimed.iter().any(|r| r.intersects(&c.region)))
        .collect();

    let mut kept = suppress_overlaps(free);
    sort_by_anchor(&mut kept, |c| c.anchor);

    let markers: Vec<MarkerRecord> = kept
        .into_iter()
        .zip(1u32..)
        .map(|(c, id)| MarkerRecord {
            id,
            anchor: c.anchor,
            region: c.region,
            confidence: c.confidence,
        })
        .collect();

    log::debug!("Detected {} markers", markers.len());
    markers
}

fn near_border(p: PixelPoint, width: u32, height: u32, margin: u32) -> bool {
    p.x < margin
        || p.y < margin
        || p.x > width.saturating_sub(margin)
        || p.y > height.saturating_sub(margin)
}

/// Joins candidates whose anchors are closer than `distance`.
///
/// A broken X shows up as several small components; each group becomes one
/// candidate with the union region, the mean anchor and the best score.
/// Closeness is chained, so a fragment between two others pulls all three
/// into one group whatever order they arrive in.
fn merge_fragments(candidates: Vec<Candidate<()>>, distance: f32) -> Vec<Candidate<()>> {
    let n = candidates.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if candidates[i].anchor.distance_to(&candidates[j].anchor) < distance {
                let (a, b) = (find_root(&mut parent, i), find_root(&mut parent, j));
                // Lowest index is the root of each group
                parent[a.max(b)] = a.min(b);
            }
        }
    }

    let mut groups: Vec<(usize, Candidate<()>, Vec<PixelPoint>)> = Vec::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let root = find_root(&mut parent, index);
        match groups.iter_mut().find(|(r, _, _)| *r == root) {
            Some((_, merged, members)) => {
                merged.region = merged.region.union(&candidate.region);
                merged.confidence = merged.confidence.max(candidate.confidence);
                members.push(candidate.anchor);
                merged.anchor = mean_point(members);
            }
            None => {
                let anchor = candidate.anchor;
                groups.push((root, candidate, vec![anchor]));
            }
        }
    }

    groups.into_iter().map(|(_, c, _)| c).collect()
}

fn find_root(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn mean_point(points: &[PixelPoint]) -> PixelPoint {
    let n = points.len().max(1) as f64;
    let sx: f64 = points.iter().map(|p| p.x as f64).sum();
    let sy: f64 = points.iter().map(|p| p.y as f64).sum();
    PixelPoint::new((sx / n).round() as u32, (sy / n).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::glyph::test_glyphs::{draw_cross, draw_low, fill};
    use crate::detect::glyph::TemplateClassifier;
    use crate::records::SymbolKind;
    use image::GrayImage;

    fn run(img: GrayImage, symbols: &[SymbolRecord], config: &MarkerConfig) -> Vec<MarkerRecord> {
        detect_markers(
            &Mask::from_image(img),
            symbols,
            config,
            &TemplateClassifier::default(),
        )
    }

    fn symbol_at(region: Region) -> SymbolRecord {
        SymbolRecord {
            id: 1,
            kind: SymbolKind::Low,
            anchor: region.center(),
            region,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_detects_single_cross() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 50, 50, 9);

        let markers = run(img, &[], &MarkerConfig::default());

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, 1);
        assert_eq!(markers[0].anchor, PixelPoint::new(54, 54));
        assert_eq!(markers[0].region, Region::new(50, 50, 9, 9));
        assert!(markers[0].confidence >= 0.5);
    }

    #[test]
    fn test_empty_mask_yields_no_markers() {
        assert!(run(GrayImage::new(50, 50), &[], &MarkerConfig::default()).is_empty());
    }

    #[test]
    fn test_cross_near_border_rejected() {
        let mut img = GrayImage::new(100, 100);
        draw_cross(&mut img, 1, 40, 9);
        draw_cross(&mut img, 90, 40, 9);

        assert!(run(img, &[], &MarkerConfig::default()).is_empty());
    }

    #[test]
    fn test_non_cross_shapes_rejected() {
        let mut img = GrayImage::new(120, 120);
        // Solid square: fill ratio 1.0
        fill(&mut img, 30, 30, 6, 6);
        // One-pixel L: fill passes but the shape does not
        draw_low(&mut img, 70, 70, 9, 9, 1);

        assert!(run(img, &[], &MarkerConfig::default()).is_empty());
    }

    #[test]
    fn test_fragments_within_distance_merge() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 50, 50, 9);
        draw_cross(&mut img, 60, 50, 9);

        let config = MarkerConfig {
            merge_distance: 12.0,
            ..MarkerConfig::default()
        };
        let markers = run(img.clone(), &[], &config);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].region, Region::new(50, 50, 19, 9));
        assert_eq!(markers[0].anchor, PixelPoint::new(59, 54));

        // Default distance keeps them apart
        let markers = run(img, &[], &MarkerConfig::default());
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn test_cross_on_symbol_is_excluded() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 50, 50, 9);
        draw_cross(&mut img, 120, 120, 9);

        let symbol = symbol_at(Region::new(40, 40, 12, 8));
        let markers = run(img, &[symbol.clone()], &MarkerConfig::default());

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].anchor, PixelPoint::new(124, 124));
        assert!(!markers[0].region.intersects(&symbol.region));
    }

    #[test]
    fn test_candidates_on_claimed_text_dropped() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 50, 50, 9);
        draw_cross(&mut img, 120, 120, 9);
        let config = MarkerConfig::default();
        let candidates =
            detect_marker_candidates(&Mask::from_image(img), &config, &TemplateClassifier::default());
        assert_eq!(candidates.len(), 2);

        // Pressure text ends 2px left of the second cross; padding reaches it
        let text = Region::new(90, 120, 28, 10);
        let markers = finalize_markers(candidates, &[text], &config);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].anchor, PixelPoint::new(54, 54));
    }

    fn fragment(x: u32, y: u32, confidence: f32) -> Candidate<()> {
        Candidate {
            kind: (),
            anchor: PixelPoint::new(x, y),
            region: Region::new(x - 2, y - 2, 5, 5),
            confidence,
        }
    }

    #[test]
    fn test_bridging_fragment_joins_both_sides() {
        for xs in [[100, 118, 109], [100, 109, 118], [109, 118, 100], [118, 100, 109]] {
            let fragments: Vec<Candidate<()>> =
                xs.iter().map(|&x| fragment(x, 50, 0.6)).collect();

            let merged = merge_fragments(fragments, 10.0);

            assert_eq!(merged.len(), 1, "order {:?}", xs);
            assert_eq!(merged[0].anchor, PixelPoint::new(109, 50));
            assert_eq!(merged[0].region, Region::new(98, 48, 23, 5));
        }
    }

    #[test]
    fn test_distant_fragments_stay_apart() {
        let merged = merge_fragments(
            vec![fragment(100, 50, 0.6), fragment(130, 50, 0.9), fragment(105, 52, 0.7)],
            10.0,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].confidence, 0.7);
        assert_eq!(merged[1].anchor, PixelPoint::new(130, 50));
    }

    fn sensitive_config() -> MarkerConfig {
        MarkerConfig {
            sensitive: SensitivePass {
                enabled: true,
                ..SensitivePass::default()
            },
            ..MarkerConfig::default()
        }
    }

    #[test]
    fn test_sensitive_pass_finds_small_blob() {
        let mut img = GrayImage::new(200, 200);
        // Solid 3x3: the shape pass rejects it on fill ratio
        fill(&mut img, 80, 80, 3, 3);

        assert!(run(img.clone(), &[], &MarkerConfig::default()).is_empty());

        let markers = run(img, &[], &sensitive_config());
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].anchor, PixelPoint::new(81, 81));
        assert_eq!(markers[0].region, Region::new(80, 80, 3, 3));
    }

    #[test]
    fn test_sensitive_pass_skips_known_markers() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 50, 50, 9);

        let markers = run(img, &[], &sensitive_config());

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].anchor, PixelPoint::new(54, 54));
    }

    #[test]
    fn test_sensitive_hits_still_respect_symbols() {
        let mut img = GrayImage::new(200, 200);
        fill(&mut img, 80, 80, 3, 3);
        let symbol = symbol_at(Region::new(70, 70, 12, 16));

        assert!(run(img, &[symbol], &sensitive_config()).is_empty());
    }

    #[test]
    fn test_markers_sorted_and_numbered() {
        let mut img = GrayImage::new(200, 200);
        draw_cross(&mut img, 150, 100, 9);
        draw_cross(&mut img, 20, 20, 9);
        draw_cross(&mut img, 100, 20, 9);

        let markers = run(img, &[], &MarkerConfig::default());
        let anchors: Vec<PixelPoint> = markers.iter().map(|m| m.anchor).collect();

        assert_eq!(
            anchors,
            vec![
                PixelPoint::new(24, 24),
                PixelPoint::new(104, 24),
                PixelPoint::new(154, 104)
            ]
        );
        assert_eq!(markers.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
