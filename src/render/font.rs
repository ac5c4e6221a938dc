//! Font resolution and text rasterization.
//!
//! Fonts are looked up by `(family, bold, italic)` in a [`FontBook`]. The
//! lookup never fails: it walks a fallback chain
//!
//! ```text
//! exact style → same family, any style → default face → built-in Spleen bitmap
//! ```
//!
//! Outline faces are rasterized with ab_glyph into anti-aliased coverage that
//! is alpha-blended onto the badge. The Spleen 12x24 bitmap font is compiled
//! into the binary so there is always something to draw with.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::BadgeError;
use crate::template::Rgb;

/// Well-known locations of a plain sans-serif face, tried in order by
/// [`FontBook::with_system_default`].
const SYSTEM_DEFAULT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Spleen glyph cell: 12x24, i.e. width is half the height.
const BITMAP_CELL_W: usize = 12;
const BITMAP_CELL_H: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    bold: bool,
    italic: bool,
}

impl FaceKey {
    fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.trim().to_lowercase(),
            bold,
            italic,
        }
    }
}

/// A drawable font: either a parsed outline face or the built-in bitmap.
#[derive(Clone)]
pub enum FontFace {
    Outline(FontArc),
    Bitmap,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontFace::Outline(_) => f.write_str("FontFace::Outline"),
            FontFace::Bitmap => f.write_str("FontFace::Bitmap"),
        }
    }
}

/// Em-size `size` expressed as ab_glyph's height-based scale.
fn px_scale(font: &FontArc, size: f32) -> PxScale {
    let units_per_em = font.units_per_em().unwrap_or(1000.0);
    PxScale::from(size * font.height_unscaled() / units_per_em)
}

impl FontFace {
    /// Horizontal advance of `text` at `size` pixels per em.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match self {
            FontFace::Outline(font) => {
                let scaled = font.as_scaled(px_scale(font, size));
                let mut width = 0.0f32;
                let mut prev = None;
                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(p) = prev {
                        width += scaled.kern(p, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width
            }
            FontFace::Bitmap => text.chars().count() as f32 * bitmap_advance(size),
        }
    }

    /// Draw `text` with its top-left corner at `(left, top)`.
    ///
    /// Pixels outside the canvas are clipped.
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, size: f32, left: f32, top: f32, color: Rgb) {
        match self {
            FontFace::Outline(font) => draw_outline(font, canvas, text, size, left, top, color),
            FontFace::Bitmap => draw_bitmap(canvas, text, size, left, top, color),
        }
    }
}

fn bitmap_advance(size: f32) -> f32 {
    size * BITMAP_CELL_W as f32 / BITMAP_CELL_H as f32
}

/// Alpha-blend `color` onto one pixel with the given coverage.
fn blend(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgb, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    let Rgba([r, g, b, a]) = *pixel;
    let mix = |dst: u8, src: u8| -> u8 {
        (dst as f32 * (1.0 - coverage) + src as f32 * coverage).round() as u8
    };
    let alpha = (a as f32 + (255.0 - a as f32) * coverage).round() as u8;
    *pixel = Rgba([
        mix(r, color.0[0]),
        mix(g, color.0[1]),
        mix(b, color.0[2]),
        alpha,
    ]);
}

fn draw_outline(font: &FontArc, canvas: &mut RgbaImage, text: &str, size: f32, left: f32, top: f32, color: Rgb) {
    let scale = px_scale(font, size);
    let scaled = font.as_scaled(scale);
    let baseline = top + scaled.ascent();

    let mut caret = left;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            caret += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, ab_glyph::point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i64 + bounds.min.x as i64;
                let y = py as i64 + bounds.min.y as i64;
                blend(canvas, x, y, color, coverage);
            });
        }
    }
}

fn draw_bitmap(canvas: &mut RgbaImage, text: &str, size: f32, left: f32, top: f32, color: Rgb) {
    let Ok(mut spleen) = PSF2Font::new(FONT_12X24) else {
        warn!("Built-in bitmap font failed to load; skipping text");
        return;
    };

    let cell_h = size.round().max(1.0) as usize;
    let cell_w = bitmap_advance(size).round().max(1.0) as usize;
    let top = top.round() as i64;

    for (i, ch) in text.chars().enumerate() {
        let mut src = [0u8; BITMAP_CELL_W * BITMAP_CELL_H];
        let utf8 = ch.to_string();
        match spleen.glyph_for_utf8(utf8.as_bytes()) {
            Some(glyph) => {
                for (row_y, row) in glyph.enumerate() {
                    for (col_x, on) in row.enumerate() {
                        if row_y < BITMAP_CELL_H && col_x < BITMAP_CELL_W && on {
                            src[row_y * BITMAP_CELL_W + col_x] = 1;
                        }
                    }
                }
            }
            None => draw_box(&mut src),
        }

        let origin_x = (left + i as f32 * bitmap_advance(size)).round() as i64;
        // Nearest-neighbour scale from 12x24 to the target cell.
        for dy in 0..cell_h {
            for dx in 0..cell_w {
                let sx = dx * BITMAP_CELL_W / cell_w;
                let sy = dy * BITMAP_CELL_H / cell_h;
                if src[sy * BITMAP_CELL_W + sx] == 1 {
                    blend(canvas, origin_x + dx as i64, top + dy as i64, color, 1.0);
                }
            }
        }
    }
}

/// Box outline for characters the bitmap font does not cover.
fn draw_box(glyph: &mut [u8]) {
    for x in 0..BITMAP_CELL_W {
        glyph[x] = 1;
        glyph[(BITMAP_CELL_H - 1) * BITMAP_CELL_W + x] = 1;
    }
    for y in 0..BITMAP_CELL_H {
        glyph[y * BITMAP_CELL_W] = 1;
        glyph[y * BITMAP_CELL_W + BITMAP_CELL_W - 1] = 1;
    }
}

/// Split a font file stem like `Roboto-BoldItalic` into family and style.
fn family_and_style(stem: &str) -> (String, bool, bool) {
    let (family, style) = match stem.rsplit_once('-') {
        Some((family, style)) => (family, style.to_lowercase()),
        None => (stem, String::new()),
    };
    let bold = style.contains("bold");
    let italic = style.contains("italic") || style.contains("oblique");
    (family.to_string(), bold, italic)
}

/// Registry of loaded faces keyed by family and style.
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<FaceKey, FontArc>,
    default_face: Option<FontArc>,
}

impl FontBook {
    /// Empty book: every lookup ends at the built-in bitmap font.
    pub fn new() -> Self {
        Self::default()
    }

    /// Book whose default face is the first available well-known system font.
    pub fn with_system_default() -> Self {
        let mut book = Self::new();
        for candidate in SYSTEM_DEFAULT_CANDIDATES {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    debug!(path = candidate, "Using system default font");
                    book.default_face = Some(font);
                    break;
                }
                Err(e) => debug!(path = candidate, error = %e, "Skipping unreadable font"),
            }
        }
        book
    }

    pub fn has_default(&self) -> bool {
        self.default_face.is_some()
    }

    /// Register a face from raw TTF/OTF bytes.
    pub fn register(&mut self, family: &str, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<(), BadgeError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| BadgeError::Image(format!("Invalid font for '{}': {}", family, e)))?;
        self.faces.insert(FaceKey::new(family, bold, italic), font);
        Ok(())
    }

    /// Use raw TTF/OTF bytes as the default face.
    pub fn set_default(&mut self, bytes: Vec<u8>) -> Result<(), BadgeError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| BadgeError::Image(format!("Invalid default font: {}", e)))?;
        self.default_face = Some(font);
        Ok(())
    }

    /// Register a font file, deriving family and style from its file stem.
    pub fn register_file(&mut self, path: &Path) -> Result<(), BadgeError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BadgeError::Image(format!("Bad font file name: {}", path.display())))?;
        let (family, bold, italic) = family_and_style(stem);
        let bytes = std::fs::read(path)?;
        self.register(&family, bold, italic, bytes)
    }

    /// Register every `.ttf`/`.otf` file directly inside `dir`.
    ///
    /// Unreadable files are skipped with a warning. Returns how many loaded.
    pub fn register_dir(&mut self, dir: &Path) -> Result<usize, BadgeError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if !is_font {
                continue;
            }
            match self.register_file(&path) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping font"),
            }
        }
        Ok(loaded)
    }

    /// Registered family names (lowercased), sorted and deduplicated.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = self.faces.keys().map(|k| k.family.clone()).collect();
        families.sort();
        families.dedup();
        families
    }

    /// Resolve a face. Never fails; see the module docs for the chain.
    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> FontFace {
        if let Some(font) = self.faces.get(&FaceKey::new(family, bold, italic)) {
            return FontFace::Outline(font.clone());
        }

        // Same family, closest style: regular first, then whatever exists.
        let styles = [
            (false, false),
            (bold, false),
            (false, italic),
            (true, false),
            (false, true),
            (true, true),
        ];
        for (b, i) in styles {
            if let Some(font) = self.faces.get(&FaceKey::new(family, b, i)) {
                debug!(family, bold, italic, "Using nearest style of family");
                return FontFace::Outline(font.clone());
            }
        }

        if let Some(font) = &self.default_face {
            debug!(family, "Font family not found; using default face");
            return FontFace::Outline(font.clone());
        }

        debug!(family, "No outline font available; using built-in bitmap font");
        FontFace::Bitmap
    }
}
