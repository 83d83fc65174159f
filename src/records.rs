//! Record types produced by one map analysis.
//!
//! All coordinates are in the source image's pixel space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
}

impl PixelPoint {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: &PixelPoint) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An axis-aligned rectangle in pixel coordinates.
///
/// `x`/`y` is the top-left pixel; the rectangle covers `width` × `height` pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from inclusive min/max pixel bounds.
    pub const fn from_bounds(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Exclusive right edge.
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub const fn area(&self) -> u32 {
        self.width * self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub const fn contains(&self, point: &PixelPoint) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// True when the two regions share at least one pixel.
    pub const fn intersects(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest region covering both.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Region::new(x, y, right - x, bottom - y)
    }

    /// Grows the region by `padding` on every side, saturating at zero.
    pub fn padded(&self, padding: u32) -> Region {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        Region::new(
            x,
            y,
            self.right() + padding - x,
            self.bottom() + padding - y,
        )
    }

    /// Clamps the region to a `width` × `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Region {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        Region::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }
}

/// Pressure system type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    Low,
    High,
}

impl SymbolKind {
    /// Glyph letter printed on the map.
    pub const fn letter(&self) -> char {
        match self {
            SymbolKind::Low => 'L',
            SymbolKind::High => 'H',
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Low => write!(f, "Low"),
            SymbolKind::High => write!(f, "High"),
        }
    }
}

impl FromStr for SymbolKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim() {
            "Low" | "L" => Ok(SymbolKind::Low),
            "High" | "H" => Ok(SymbolKind::High),
            other => Err(anyhow::anyhow!("Unknown symbol kind: {}", other)),
        }
    }
}

/// A detected L or H glyph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: u32,
    pub kind: SymbolKind,
    pub anchor: PixelPoint,
    pub region: Region,
    /// Glyph match score, 0.0 to 1.0
    pub confidence: f32,
}

/// A detected X marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub id: u32,
    pub anchor: PixelPoint,
    pub region: Region,
    /// Glyph match score, 0.0 to 1.0
    pub confidence: f32,
}

/// Pressure reading attached to one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureValue {
    /// Text the recognizer returned for the winning token (or everything it saw on failure)
    pub raw_text: String,
    /// Parsed pressure in hPa; `None` when nothing plausible was readable
    pub value: Option<u32>,
    /// Recognition confidence, 0.0 to 1.0
    pub confidence: f32,
    /// Where the winning token sits in the source image
    pub text_region: Option<Region>,
}

impl PressureValue {
    /// A reading where nothing usable was recognized.
    pub fn unreadable(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            value: None,
            confidence: 0.0,
            text_region: None,
        }
    }
}

/// One finalized pressure system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub symbol: SymbolRecord,
    pub pressure: Option<PressureValue>,
    /// Linked markers ordered by id
    pub markers: Vec<MarkerRecord>,
}

/// Sorts by anchor, top-to-bottom then left-to-right.
pub(crate) fn sort_by_anchor<T>(items: &mut [T], anchor: impl Fn(&T) -> PixelPoint) {
    items.sort_by_key(|item| {
        let p = anchor(item);
        (p.y, p.x)
    });
}
