//! Connected-component extraction over binary masks.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

use super::glyph::GlyphPatch;
use crate::records::{PixelPoint, Region};

/// Per-component statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    /// Label in the component map (1-based)
    pub label: u32,
    /// Number of set pixels
    pub area: u32,
    /// Bounding box
    pub region: Region,
    sum_x: u64,
    sum_y: u64,
}

impl Component {
    /// Pixel centroid, rounded to the nearest pixel.
    pub fn centroid(&self) -> PixelPoint {
        let n = self.area.max(1) as f64;
        PixelPoint::new(
            (self.sum_x as f64 / n).round() as u32,
            (self.sum_y as f64 / n).round() as u32,
        )
    }

    /// Bounding box width / height.
    pub fn aspect_ratio(&self) -> f32 {
        if self.region.height == 0 {
            return 0.0;
        }
        self.region.width as f32 / self.region.height as f32
    }

    /// Fraction of the bounding box covered by component pixels.
    pub fn fill_ratio(&self) -> f32 {
        let box_area = self.region.area();
        if box_area == 0 {
            return 0.0;
        }
        self.area as f32 / box_area as f32
    }
}

/// Labelled mask plus statistics for every component, ordered by label.
pub struct ComponentMap {
    labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    components: Vec<Component>,
}

impl ComponentMap {
    /// Labels 8-connected foreground (non-zero) pixels.
    pub fn from_mask(mask: &GrayImage) -> Self {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        // (area, min_x, min_y, max_x, max_y, sum_x, sum_y)
        let mut stats: BTreeMap<u32, (u32, u32, u32, u32, u32, u64, u64)> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue;
            }
            stats
                .entry(label)
                .and_modify(|(area, min_x, min_y, max_x, max_y, sx, sy)| {
                    *area += 1;
                    *min_x = (*min_x).min(x);
                    *min_y = (*min_y).min(y);
                    *max_x = (*max_x).max(x);
                    *max_y = (*max_y).max(y);
                    *sx += x as u64;
                    *sy += y as u64;
                })
                .or_insert((1, x, y, x, y, x as u64, y as u64));
        }

        let components = stats
            .into_iter()
            .map(
                |(label, (area, min_x, min_y, max_x, max_y, sum_x, sum_y))| Component {
                    label,
                    area,
                    region: Region::from_bounds(min_x, min_y, max_x, max_y),
                    sum_x,
                    sum_y,
                },
            )
            .collect();

        Self { labels, components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Label at a pixel (0 = background).
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y)[0]
    }

    /// Binary patch of one component's own pixels inside its bounding box.
    ///
    /// Pixels of other components that fall inside the box are left unset.
    pub fn patch(&self, component: &Component) -> GlyphPatch {
        let r = component.region;
        GlyphPatch::from_fn(r.width, r.height, |px, py| {
            self.label_at(r.x + px, r.y + py) == component.label
        })
    }
}
