//! Debug overlay rendering.
//!
//! Draws symbol boxes, pressure text boxes and marker links on a copy of the
//! source map so detections can be reviewed by eye.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use super::MapReport;
use crate::records::{PixelPoint, Region, SymbolKind};

/// Color constants for overlay rendering.
pub const COLOR_LOW: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green
pub const COLOR_HIGH: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red
pub const COLOR_PRESSURE: Rgba<u8> = Rgba([255, 128, 0, 255]); // Orange
pub const COLOR_LINKED: Rgba<u8> = Rgba([0, 0, 255, 255]); // Blue
pub const COLOR_UNLINKED: Rgba<u8> = Rgba([128, 128, 128, 255]); // Gray

const MARKER_RADIUS: i32 = 4;

fn symbol_color(kind: SymbolKind) -> Rgba<u8> {
    match kind {
        SymbolKind::Low => COLOR_LOW,
        SymbolKind::High => COLOR_HIGH,
    }
}

/// Renders every detection of a report onto a copy of the source map.
pub fn render_overlay(source: &RgbaImage, report: &MapReport) -> RgbaImage {
    let mut img = source.clone();

    for system in &report.systems {
        let color = symbol_color(system.symbol.kind);
        draw_rect(&mut img, system.symbol.region.padded(2), color, 2);

        if let Some(text) = system.pressure.as_ref().and_then(|p| p.text_region) {
            draw_rect(&mut img, text, COLOR_PRESSURE, 1);
        }

        for marker in &system.markers {
            draw_line_segment_mut(
                &mut img,
                as_f32(marker.anchor),
                as_f32(system.symbol.anchor),
                color,
            );
            draw_dot(&mut img, marker.anchor, COLOR_LINKED);
        }
    }

    for unlinked in &report.unlinked_markers {
        draw_dot(&mut img, unlinked.marker.anchor, COLOR_UNLINKED);
    }

    img
}

fn as_f32(p: PixelPoint) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

fn draw_dot(img: &mut RgbaImage, center: PixelPoint, color: Rgba<u8>) {
    draw_filled_circle_mut(img, (center.x as i32, center.y as i32), MARKER_RADIUS, color);
}

/// Draws a rectangle border on an image, clipped to its bounds.
pub fn draw_rect(img: &mut RgbaImage, region: Region, color: Rgba<u8>, thickness: u32) {
    let (img_w, img_h) = img.dimensions();
    let Region {
        x,
        y,
        width: w,
        height: h,
    } = region;
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for t in 0..thickness.min(h) {
        for dx in 0..w {
            // Top and bottom edges
            put(x + dx, y + t);
            put(x + dx, y + h - 1 - t);
        }
    }
    for t in 0..thickness.min(w) {
        for dy in 0..h {
            // Left and right edges
            put(x + t, y + dy);
            put(x + w - 1 - t, y + dy);
        }
    }
}
