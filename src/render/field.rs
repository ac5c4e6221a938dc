//! Drawing a single text field, with auto-shrink.
//!
//! When a field has a `max_width`, the text is measured and the size is
//! decremented one point at a time until it fits or reaches
//! [`MIN_SHRINK_SIZE`]. At the floor the text is drawn anyway, overflowing:
//! text is never hidden, only shrunk.

use image::RgbaImage;
use tracing::warn;

use super::font::{FontBook, FontFace};
use crate::template::{Alignment, FieldPlacement};

/// Auto-shrink never goes below this size.
pub const MIN_SHRINK_SIZE: u32 = 8;

/// Where and how large a field ended up being drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLayout {
    /// Final font size after auto-shrink.
    pub size: u32,
    /// Measured text width at `size`.
    pub width: f32,
    /// Left edge of the text in template space.
    pub left: f32,
    /// Top edge of the text in template space.
    pub top: f32,
    /// How many one-point decrements were applied.
    pub shrink_steps: u32,
    /// True when the text still exceeds `max_width` at the floor size.
    pub overflow: bool,
}

/// Result of the shrink search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedSize {
    pub size: u32,
    pub width: f32,
    pub steps: u32,
}

/// Linear shrink search: largest size `<= initial` whose width fits, floored
/// at [`MIN_SHRINK_SIZE`]. `max_width == 0` disables shrinking.
pub fn fit_font_size(face: &FontFace, text: &str, initial: u32, max_width: u32) -> FittedSize {
    let mut size = initial.max(1);
    let mut width = face.measure(text, size as f32);
    let mut steps = 0;

    if max_width > 0 {
        while width > max_width as f32 && size > MIN_SHRINK_SIZE {
            size -= 1;
            steps += 1;
            width = face.measure(text, size as f32);
        }
    }

    FittedSize { size, width, steps }
}

/// Left edge for text of `width` anchored at `x` with `alignment`.
pub fn anchor_left(x: f32, width: f32, alignment: Alignment) -> f32 {
    match alignment {
        Alignment::Left => x,
        Alignment::Center => x - width / 2.0,
        Alignment::Right => x - width,
    }
}

/// Compute where `text` would be drawn for `field`, without drawing it.
pub fn layout_field(field: &FieldPlacement, text: &str, face: &FontFace) -> FieldLayout {
    let fitted = fit_font_size(face, text, field.font_size, field.max_width);
    let overflow = field.max_width > 0 && fitted.width > field.max_width as f32;

    FieldLayout {
        size: fitted.size,
        width: fitted.width,
        left: anchor_left(field.x, fitted.width, field.alignment),
        top: field.y,
        shrink_steps: fitted.steps,
        overflow,
    }
}

/// Draw one field onto `canvas`. Returns `None` (and draws nothing) for
/// empty text.
pub fn draw_field(canvas: &mut RgbaImage, field: &FieldPlacement, text: &str, fonts: &FontBook) -> Option<FieldLayout> {
    if text.is_empty() {
        return None;
    }

    let face = fonts.resolve(&field.font_family, field.bold, field.italic);
    let layout = layout_field(field, text, &face);

    if layout.overflow {
        warn!(
            column = %field.column,
            width = layout.width,
            max_width = field.max_width,
            "Text still overflows at minimum size; drawing anyway"
        );
    }

    face.draw(canvas, text, layout.size as f32, layout.left, layout.top, field.color);
    Some(layout)
}
