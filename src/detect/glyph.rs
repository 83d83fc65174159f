//! Glyph scoring.
//!
//! Detectors never look at glyph shapes directly; they hand a [`GlyphPatch`]
//! to a [`GlyphClassifier`] and get back a score per glyph. The shipped
//! classifier correlates a coarse coverage grid of the patch with small
//! bitmap templates, which keeps the score independent of glyph size and
//! stroke width. Another strategy (a trained model, say) only has to
//! implement the trait.

use crate::records::SymbolKind;

/// Glyphs the detectors look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Glyph {
    Low,
    High,
    Cross,
}

impl From<SymbolKind> for Glyph {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Low => Glyph::Low,
            SymbolKind::High => Glyph::High,
        }
    }
}

/// A binary image of one connected component, cropped to its bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphPatch {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl GlyphPatch {
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    /// Parses `#`/`.` rows, mostly for tests and templates.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len()) as u32;
        Self::from_fn(width, height, |x, y| {
            rows[y as usize].as_bytes().get(x as usize) == Some(&b'#')
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    /// Fraction of set pixels in each cell of a `cols` × `rows` grid laid over
    /// the patch, row-major. Cells are at least one pixel wide even when the
    /// patch is smaller than the grid.
    pub fn coverage_grid(&self, cols: u32, rows: u32) -> Vec<f32> {
        let mut grid = Vec::with_capacity((cols * rows) as usize);
        for cy in 0..rows {
            let (y0, y1) = cell_span(cy, rows, self.height);
            for cx in 0..cols {
                let (x0, x1) = cell_span(cx, cols, self.width);
                let mut set = 0u32;
                let mut total = 0u32;
                for y in y0..y1 {
                    for x in x0..x1 {
                        total += 1;
                        if self.is_set(x, y) {
                            set += 1;
                        }
                    }
                }
                grid.push(if total == 0 {
                    0.0
                } else {
                    set as f32 / total as f32
                });
            }
        }
        grid
    }
}

fn cell_span(index: u32, cells: u32, extent: u32) -> (u32, u32) {
    let start = index * extent / cells;
    let end = ((index + 1) * extent / cells).max(start + 1).min(extent.max(1));
    (start.min(end), end)
}

/// Scores how well a patch matches a glyph, 0.0 (no resemblance) to 1.0.
pub trait GlyphClassifier: Send + Sync {
    fn score(&self, patch: &GlyphPatch, glyph: Glyph) -> f32;
}

/// Template bitmaps for the letters printed on surface analysis charts.
const LOW_TEMPLATE: [&str; 7] = [
    "#....",
    "#....",
    "#....",
    "#....",
    "#....",
    "#....",
    "#####",
];

const HIGH_TEMPLATE: [&str; 7] = [
    "#...#",
    "#...#",
    "#...#",
    "#####",
    "#...#",
    "#...#",
    "#...#",
];

const CROSS_TEMPLATE: [&str; 5] = [
    "#...#",
    ".#.#.",
    "..#..",
    ".#.#.",
    "#...#",
];

struct Template {
    cols: u32,
    rows: u32,
    cells: Vec<f32>,
}

impl Template {
    fn from_rows(rows: &[&str]) -> Self {
        let patch = GlyphPatch::from_rows(rows);
        Self {
            cols: patch.width(),
            rows: patch.height(),
            cells: patch.bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }
}

/// Normalized cross-correlation against fixed bitmap templates.
pub struct TemplateClassifier {
    low: Template,
    high: Template,
    cross: Template,
}

impl Default for TemplateClassifier {
    fn default() -> Self {
        Self {
            low: Template::from_rows(&LOW_TEMPLATE),
            high: Template::from_rows(&HIGH_TEMPLATE),
            cross: Template::from_rows(&CROSS_TEMPLATE),
        }
    }
}

impl TemplateClassifier {
    fn template(&self, glyph: Glyph) -> &Template {
        match glyph {
            Glyph::Low => &self.low,
            Glyph::High => &self.high,
            Glyph::Cross => &self.cross,
        }
    }
}

impl GlyphClassifier for TemplateClassifier {
    fn score(&self, patch: &GlyphPatch, glyph: Glyph) -> f32 {
        if patch.width() == 0 || patch.height() == 0 {
            return 0.0;
        }
        let template = self.template(glyph);
        let coverage = patch.coverage_grid(template.cols, template.rows);
        correlation(&template.cells, &coverage).max(0.0)
    }
}

/// Pearson correlation of two equally sized samples. Zero when either is flat.
fn correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a.iter().take(n).sum::<f32>() / n as f32;
    let mean_b = b.iter().take(n).sum::<f32>() / n as f32;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    cov / denom
}
