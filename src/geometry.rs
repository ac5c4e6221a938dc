//! # Coordinate Mapping
//!
//! Pure conversions between **template space** (the fixed badge pixel canvas)
//! and **display space** (a viewport of arbitrary size that shows the badge
//! scaled down, centered, aspect preserved).
//!
//! Used by the interactive editor only; export always works in template space.
//!
//! ```text
//! display = template * scale + offset
//! template = (display - offset) / scale
//! ```

/// Uniform scale that fits `content` inside `bound` without distortion.
///
/// Returns `1.0` for degenerate content (non-positive width or height).
pub fn scale_to_fit(content_w: f32, content_h: f32, bound_w: f32, bound_h: f32) -> f32 {
    if content_w <= 0.0 || content_h <= 0.0 {
        return 1.0;
    }
    (bound_w / content_w).min(bound_h / content_h)
}

/// Template → display.
pub fn to_display(x: f32, y: f32, scale: f32, offset_x: f32, offset_y: f32) -> (f32, f32) {
    (x * scale + offset_x, y * scale + offset_y)
}

/// Display → template. A zero scale maps everything to the origin.
pub fn to_template(dx: f32, dy: f32, scale: f32, offset_x: f32, offset_y: f32) -> (f32, f32) {
    if scale == 0.0 {
        return (0.0, 0.0);
    }
    ((dx - offset_x) / scale, (dy - offset_y) / scale)
}

/// Offsets that center `content` scaled by `scale` inside a viewport.
pub fn centering_offsets(
    viewport_w: f32,
    viewport_h: f32,
    content_w: f32,
    content_h: f32,
    scale: f32,
) -> (f32, f32) {
    (
        (viewport_w - content_w * scale) / 2.0,
        (viewport_h - content_h * scale) / 2.0,
    )
}

/// Clamp a template-space point to `[0, width] x [0, height]`.
pub fn clamp_to_template(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    (x.clamp(0.0, width as f32), y.clamp(0.0, height as f32))
}

/// Approximate on-screen font size for a field drawn in a scaled preview.
///
/// Never below 8, matching the auto-shrink floor.
pub fn display_font_size(font_size: u32, scale: f32) -> u32 {
    ((font_size as f32 * scale).floor().max(0.0) as u32).max(8)
}

/// A badge shown inside an editor viewport: scale plus centering offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Viewport {
    /// Fit `content` into a `viewport_w x viewport_h` area, leaving `padding`
    /// pixels of slack in each dimension, and center it in the full area.
    pub fn fit(viewport_w: f32, viewport_h: f32, content_w: f32, content_h: f32, padding: f32) -> Self {
        let scale = scale_to_fit(
            content_w,
            content_h,
            viewport_w - padding,
            viewport_h - padding,
        );
        let (offset_x, offset_y) =
            centering_offsets(viewport_w, viewport_h, content_w, content_h, scale);
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    pub fn to_display(&self, x: f32, y: f32) -> (f32, f32) {
        to_display(x, y, self.scale, self.offset_x, self.offset_y)
    }

    pub fn to_template(&self, dx: f32, dy: f32) -> (f32, f32) {
        to_template(dx, dy, self.scale, self.offset_x, self.offset_y)
    }
}
