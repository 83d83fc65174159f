use image::{GrayImage, Luma};

use crate::config::{OcrConfig, TextPolarity};
use crate::records::{PixelPoint, Region};

const TEXT: u8 = 0;
const BACKGROUND: u8 = 255;

/// Search window around a symbol anchor, clamped to the image.
///
/// The window is centred at `anchor + (offset_x, offset_y)`. Returns an empty
/// region when the window falls completely outside the image.
pub fn search_window(anchor: PixelPoint, config: &OcrConfig, width: u32, height: u32) -> Region {
    let cx = anchor.x as i64 + config.offset_x as i64;
    let cy = anchor.y as i64 + config.offset_y as i64;
    let x0 = cx - config.window_width as i64 / 2;
    let y0 = cy - config.window_height as i64 / 2;
    let x1 = x0 + config.window_width as i64;
    let y1 = y0 + config.window_height as i64;

    let clamp_x = |v: i64| v.clamp(0, width as i64) as u32;
    let clamp_y = |v: i64| v.clamp(0, height as i64) as u32;
    let (left, right) = (clamp_x(x0), clamp_x(x1));
    let (top, bottom) = (clamp_y(y0), clamp_y(y1));

    Region::new(left, top, right - left, bottom - top)
}

/// Converts a grayscale crop to black text on a white background.
///
/// With [`TextPolarity::Bright`], pixels brighter than `threshold` are text;
/// with [`TextPolarity::Dark`], pixels darker than it are.
pub fn binarize_text(img: &GrayImage, threshold: u8, polarity: TextPolarity) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0];
        let is_text = match polarity {
            TextPolarity::Bright => v > threshold,
            TextPolarity::Dark => v < threshold,
        };
        Luma([if is_text { TEXT } else { BACKGROUND }])
    })
}

/// Crops `region` out of the image.
pub fn crop(img: &GrayImage, region: Region) -> GrayImage {
    let r = region.clamp_to(img.width(), img.height());
    image::imageops::crop_imm(img, r.x, r.y, r.width, r.height).to_image()
}

/// Paints the part of `region` that overlaps the crop as background.
///
/// `origin` is where the crop sits in source coordinates.
pub fn blank_region(crop: &mut GrayImage, origin: PixelPoint, region: Region) {
    let local = Region::new(origin.x, origin.y, crop.width(), crop.height());
    if !local.intersects(&region) {
        return;
    }
    let x0 = region.x.max(local.x);
    let y0 = region.y.max(local.y);
    let x1 = region.right().min(local.right());
    let y1 = region.bottom().min(local.bottom());
    for y in y0..y1 {
        for x in x0..x1 {
            crop.put_pixel(x - origin.x, y - origin.y, Luma([BACKGROUND]));
        }
    }
}
