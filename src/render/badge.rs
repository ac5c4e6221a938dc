//! Composing a full badge for one data row.
//!
//! ```text
//! background (override | template path | white)
//!      ↓ copy, resize to template size
//! field 0 → field 1 → ... → field n   (list order; later fields paint over earlier)
//!      ↓
//! RgbaImage (template.width x template.height)
//! ```

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops::FilterType};
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

use super::field::draw_field;
use super::font::FontBook;
use crate::data::{DataSource, Row, SingleRow};
use crate::error::BadgeError;
use crate::template::Template;

/// Upper bound on decoded background size.
pub const MAX_IMAGE_PIXELS: u64 = 25_000_000;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Decode a background image and scale it to the badge size.
///
/// Any failure (missing file, unsupported format, oversized image) yields
/// `None`; callers treat that as "no background".
pub fn load_background(path: &Path, width: u32, height: u32) -> Option<RgbaImage> {
    let decoded = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Background failed to decode; using white");
            return None;
        }
    };
    if decoded.width() as u64 * decoded.height() as u64 > MAX_IMAGE_PIXELS {
        warn!(path = %path.display(), "Background exceeds pixel limit; using white");
        return None;
    }
    Some(fit_to_badge(decoded.to_rgba8(), width, height))
}

/// Decode an uploaded image (any format the image crate understands).
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, BadgeError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BadgeError::Image(format!("Failed to decode image: {}", e)))?;
    let pixels = img.width() as u64 * img.height() as u64;
    if pixels > MAX_IMAGE_PIXELS {
        return Err(BadgeError::Image(format!(
            "Image too large ({} pixels, max {})",
            pixels, MAX_IMAGE_PIXELS
        )));
    }
    Ok(img.to_rgba8())
}

/// Resize to exactly `width x height` unless it already matches.
fn fit_to_badge(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        image::imageops::resize(&img, width, height, FilterType::Lanczos3)
    }
}

/// Fresh canvas for one badge. The shared background is only read.
fn base_canvas(template: &Template, background: Option<&RgbaImage>) -> RgbaImage {
    if let Some(bg) = background {
        return fit_to_badge(bg.clone(), template.width, template.height);
    }
    if let Some(path) = &template.background {
        if let Some(bg) = load_background(path, template.width, template.height) {
            return bg;
        }
    }
    RgbaImage::from_pixel(template.width, template.height, WHITE)
}

/// Render the badge for `row` of `data`.
///
/// `background` lets a batch decode the background once and share it across
/// rows. An out-of-range `row` is not checked here; the data source decides
/// what text it yields.
pub fn render_badge(
    template: &Template,
    data: &dyn DataSource,
    row: usize,
    background: Option<&RgbaImage>,
    fonts: &FontBook,
) -> RgbaImage {
    let mut canvas = base_canvas(template, background);
    for field in &template.fields {
        let text = data.value_at(row, &field.column);
        draw_field(&mut canvas, field, text, fonts);
    }
    canvas
}

/// Render a badge from ad-hoc values rather than a loaded data source.
pub fn render_values(template: &Template, values: &Row, background: Option<&RgbaImage>, fonts: &FontBook) -> RgbaImage {
    render_badge(template, &SingleRow(values), 0, background, fonts)
}

/// Flatten a badge onto RGB and encode it as PNG.
pub fn encode_png(badge: &RgbaImage) -> Result<Vec<u8>, BadgeError> {
    let rgb = DynamicImage::ImageRgba8(badge.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| BadgeError::Image(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer.into_inner())
}
