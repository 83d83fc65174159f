//! Mask generation.
//!
//! Turns a source map into binary masks of candidate glyph pixels. Each mask
//! profile thresholds the luma channel; cartography colors and fixed map areas
//! (the title header) are suppressed, then speckle is cleaned up with an
//! optional morphological opening and a minimum blob area.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

use crate::config::{MaskConfig, MaskProfile};
use crate::detect::components::ComponentMap;

const SET: u8 = 255;

/// A binary image: 255 = candidate pixel, 0 = background.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// Wraps a grayscale image, treating any non-zero pixel as set.
    pub fn from_image(mut image: GrayImage) -> Self {
        for p in image.pixels_mut() {
            if p[0] != 0 {
                p[0] = SET;
            }
        }
        Self { image }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] != 0
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p[0] == 0)
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// The two masks one analysis works from.
#[derive(Clone, Debug)]
pub struct MaskSet {
    /// Candidate L/H glyph pixels
    pub symbols: Mask,
    /// Candidate X marker pixels
    pub markers: Mask,
}

/// Builds both masks from a source map.
///
/// Never fails: a map with no matching pixels yields empty masks.
pub fn generate_masks(source: &RgbaImage, config: &MaskConfig) -> MaskSet {
    let gray = image::imageops::grayscale(source);
    let excluded = exclusion_map(source, config);

    let symbols = generate_mask(&gray, &excluded, &config.symbols);
    let markers = generate_mask(&gray, &excluded, &config.markers);

    log::debug!(
        "Masks: {} symbol pixels, {} marker pixels",
        symbols.count(),
        markers.count()
    );

    MaskSet { symbols, markers }
}

/// Pixels ignored by every profile, row-major.
fn exclusion_map(source: &RgbaImage, config: &MaskConfig) -> Vec<bool> {
    let (width, height) = source.dimensions();
    let mut excluded = vec![false; (width * height) as usize];

    for rect in &config.exclude_regions {
        let r = rect.to_region(width, height);
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                excluded[(y * width + x) as usize] = true;
            }
        }
    }

    if !config.exclude_colors.is_empty() {
        for (x, y, pixel) in source.enumerate_pixels() {
            let rgb = [pixel[0], pixel[1], pixel[2]];
            if config.exclude_colors.iter().any(|range| range.contains(rgb)) {
                excluded[(y * width + x) as usize] = true;
            }
        }
    }

    excluded
}

/// Applies one profile to the luma image.
pub fn generate_mask(gray: &GrayImage, excluded: &[bool], profile: &MaskProfile) -> Mask {
    let (width, height) = gray.dimensions();
    let is_excluded = |x: u32, y: u32| {
        excluded
            .get((y * width + x) as usize)
            .copied()
            .unwrap_or(false)
    };

    let stretch = if profile.stretch_contrast {
        contrast_bounds(gray, &is_excluded)
    } else {
        None
    };

    let mut mask = GrayImage::from_fn(width, height, |x, y| {
        if is_excluded(x, y) {
            return Luma([0]);
        }
        let mut v = gray.get_pixel(x, y)[0];
        if let Some((lo, hi)) = stretch {
            v = stretch_value(v, lo, hi);
        }
        let keep = v >= profile.min_luma && v <= profile.max_luma;
        Luma([if keep { SET } else { 0 }])
    });

    if profile.open_radius > 0 {
        mask = erode(&mask, Norm::LInf, profile.open_radius);
        mask = dilate(&mask, Norm::LInf, profile.open_radius);
    }

    if profile.min_blob_area > 1 {
        remove_small_blobs(&mut mask, profile.min_blob_area);
    }

    Mask { image: mask }
}

/// Darkest and brightest luma among pixels that are not excluded.
fn contrast_bounds(gray: &GrayImage, is_excluded: &impl Fn(u32, u32) -> bool) -> Option<(u8, u8)> {
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for (x, y, p) in gray.enumerate_pixels() {
        if is_excluded(x, y) {
            continue;
        }
        lo = lo.min(p[0]);
        hi = hi.max(p[0]);
    }
    (hi > lo).then_some((lo, hi))
}

fn stretch_value(v: u8, lo: u8, hi: u8) -> u8 {
    let v = v.clamp(lo, hi);
    ((v - lo) as u32 * 255 / (hi - lo) as u32) as u8
}

/// Clears every 8-connected blob with fewer than `min_area` pixels.
fn remove_small_blobs(mask: &mut GrayImage, min_area: u32) {
    let components = ComponentMap::from_mask(mask);
    for c in components.components().iter().filter(|c| c.area < min_area) {
        let r = c.region;
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                if components.label_at(x, y) == c.label {
                    mask.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }
}
