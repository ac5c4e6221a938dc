//! # Badge Template Model
//!
//! A [`Template`] is the reusable badge design: canvas size, optional
//! background, the ordered list of [`FieldPlacement`]s, and the page grid
//! options used when exporting.
//!
//! All types derive `Serialize + Deserialize` so the same values work for the
//! Rust API, template files on disk, and the HTTP JSON bodies. Missing keys
//! take their defaults and unknown keys are ignored, so older template files
//! (which used `csv_column`, `font_color`, `badges_per_row`, ...) still load.
//!
//! ## Example
//!
//! ```
//! use badgeforge::template::{Alignment, FieldPlacement, Template};
//!
//! let mut template = Template::default();
//! template.fields.push(FieldPlacement {
//!     column: "Name".into(),
//!     x: 525.0,
//!     y: 260.0,
//!     font_size: 40,
//!     alignment: Alignment::Center,
//!     max_width: 900,
//!     ..Default::default()
//! });
//! assert!(template.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::BadgeError;
use crate::layout::MM_TO_PT;

/// Field keys that an editor is allowed to change in place.
///
/// `column` is intentionally absent: re-binding a field is done by deleting
/// and re-adding it.
pub const FIELD_EDITABLE_KEYS: &[&str] = &[
    "x",
    "y",
    "font_family",
    "font_size",
    "color",
    "bold",
    "italic",
    "alignment",
    "max_width",
];

/// Upper bound on `columns_per_page * rows_per_page`.
pub const MAX_BADGES_PER_PAGE: usize = 1024;

/// Template keys covered by the page/layout configuration.
pub const CONFIG_KEYS: &[&str] = &[
    "columns_per_page",
    "rows_per_page",
    "page_size",
    "margin_mm",
    "spacing_mm",
    "width",
    "height",
];

// ============================================================================
// COLOR
// ============================================================================

/// 8-bit RGB color, written as `#rrggbb` in documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    /// Parse `#rrggbb`, `rrggbb`, or the short `#rgb` form.
    pub fn parse(s: &str) -> Result<Self, BadgeError> {
        let hex = s.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(BadgeError::Template(format!("Invalid color '{}'", s))),
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| BadgeError::Template(format!("Invalid color '{}'", s)))
        };

        Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl TryFrom<String> for Rgb {
    type Error = BadgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

// ============================================================================
// ENUMS
// ============================================================================

/// Horizontal anchor of a field relative to its `(x, y)` position.
///
/// Unknown values in a document fall back to `Center`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl From<String> for Alignment {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "left" => Alignment::Left,
            "right" => Alignment::Right,
            _ => Alignment::Center,
        }
    }
}

impl From<Alignment> for String {
    fn from(value: Alignment) -> Self {
        value.as_str().to_string()
    }
}

/// Output page size. Anything other than `A4` (case-insensitive) is Letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageSize {
    #[default]
    Letter,
    A4,
}

impl PageSize {
    /// Page dimensions in PDF points (1/72 inch), portrait.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.2756, 841.8898),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::Letter => "letter",
            PageSize::A4 => "A4",
        }
    }
}

impl From<String> for PageSize {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("a4") {
            PageSize::A4
        } else {
            PageSize::Letter
        }
    }
}

impl From<PageSize> for String {
    fn from(value: PageSize) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// FIELD PLACEMENT
// ============================================================================

fn default_font_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    24
}

/// One text field bound to a data column.
///
/// `x`/`y` are template-space pixels; which point of the text they pin is
/// decided by [`alignment`](FieldPlacement::alignment) (always the top edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPlacement {
    #[serde(alias = "csv_column")]
    pub column: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Point size at template scale.
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default, alias = "font_color")]
    pub color: Rgb,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub alignment: Alignment,
    /// 0 = unconstrained; otherwise text is shrunk to fit this many pixels.
    #[serde(default)]
    pub max_width: u32,
}

impl Default for FieldPlacement {
    fn default() -> Self {
        Self {
            column: String::new(),
            x: 0.0,
            y: 0.0,
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: Rgb::BLACK,
            bold: false,
            italic: false,
            alignment: Alignment::Center,
            max_width: 0,
        }
    }
}

impl FieldPlacement {
    /// Apply a partial JSON update, ignoring keys outside [`FIELD_EDITABLE_KEYS`].
    ///
    /// The update is all-or-nothing: if any allowed value has the wrong type
    /// the field is left untouched.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), BadgeError> {
        *self = merge_patch(&*self, patch, FIELD_EDITABLE_KEYS)?;
        Ok(())
    }
}

// ============================================================================
// TEMPLATE
// ============================================================================

fn default_width() -> u32 {
    1050
}

fn default_height() -> u32 {
    600
}

fn default_columns() -> u32 {
    2
}

fn default_rows() -> u32 {
    4
}

fn default_margin() -> f32 {
    10.0
}

fn default_spacing() -> f32 {
    2.0
}

/// Complete badge design plus the page grid options used for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Background image path; empty/absent means a plain white badge.
    #[serde(default, alias = "background_image_path", deserialize_with = "empty_path_is_none")]
    pub background: Option<PathBuf>,
    /// Badge width in template pixels (3.5" at 300 DPI by default).
    #[serde(default = "default_width", alias = "badge_width")]
    pub width: u32,
    /// Badge height in template pixels (2" at 300 DPI by default).
    #[serde(default = "default_height", alias = "badge_height")]
    pub height: u32,
    #[serde(default)]
    pub fields: Vec<FieldPlacement>,
    #[serde(default = "default_columns", alias = "badges_per_row")]
    pub columns_per_page: u32,
    #[serde(default = "default_rows", alias = "badges_per_col")]
    pub rows_per_page: u32,
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default = "default_margin")]
    pub margin_mm: f32,
    #[serde(default = "default_spacing")]
    pub spacing_mm: f32,
}

fn empty_path_is_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
}

impl Default for Template {
    fn default() -> Self {
        Self {
            background: None,
            width: default_width(),
            height: default_height(),
            fields: Vec::new(),
            columns_per_page: default_columns(),
            rows_per_page: default_rows(),
            page_size: PageSize::Letter,
            margin_mm: default_margin(),
            spacing_mm: default_spacing(),
        }
    }
}

impl Template {
    /// Number of badges that fit on one page, saturating on absurd grids.
    pub fn badges_per_page(&self) -> usize {
        (self.columns_per_page as usize)
            .checked_mul(self.rows_per_page as usize)
            .unwrap_or(usize::MAX)
    }

    /// Check the invariants the renderer and compositor rely on.
    ///
    /// The core does not call this itself; callers validate before exporting.
    pub fn validate(&self) -> Result<(), BadgeError> {
        if self.width == 0 || self.height == 0 {
            return Err(BadgeError::Template(format!(
                "Badge dimensions must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        if self.columns_per_page == 0 || self.rows_per_page == 0 {
            return Err(BadgeError::Template(format!(
                "Grid must be at least 1x1 (got {}x{})",
                self.columns_per_page, self.rows_per_page
            )));
        }
        let per_page = (self.columns_per_page as usize).checked_mul(self.rows_per_page as usize);
        if per_page.is_none_or(|n| n > MAX_BADGES_PER_PAGE) {
            return Err(BadgeError::Template(format!(
                "Grid {}x{} exceeds {} badges per page",
                self.columns_per_page, self.rows_per_page, MAX_BADGES_PER_PAGE
            )));
        }
        if !(self.margin_mm >= 0.0) || !(self.spacing_mm >= 0.0) {
            return Err(BadgeError::Template(
                "Margin and spacing must be non-negative".to_string(),
            ));
        }
        let (page_w, page_h) = self.page_size.dimensions_pt();
        let cell = |page: f32, count: u32| {
            let usable = page - 2.0 * self.margin_mm * MM_TO_PT;
            (usable - (count as f32 - 1.0) * self.spacing_mm * MM_TO_PT) / count as f32
        };
        if !(cell(page_w, self.columns_per_page) > 0.0 && cell(page_h, self.rows_per_page) > 0.0) {
            return Err(BadgeError::Template(format!(
                "Margin {} mm and spacing {} mm leave no room for a {}x{} grid",
                self.margin_mm, self.spacing_mm, self.columns_per_page, self.rows_per_page
            )));
        }
        if let Some((idx, _)) = self.fields.iter().enumerate().find(|(_, f)| f.font_size == 0) {
            return Err(BadgeError::Template(format!(
                "Field {} has a zero font size",
                idx
            )));
        }
        Ok(())
    }

    /// Parse a template from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, BadgeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, BadgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, BadgeError> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<(), BadgeError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Apply a partial layout update restricted to [`CONFIG_KEYS`].
    pub fn apply_config_patch(&mut self, patch: &Map<String, Value>) -> Result<(), BadgeError> {
        let updated: Template = merge_patch(&*self, patch, CONFIG_KEYS)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Move a field to a template-space position, clamped to the badge bounds.
    ///
    /// Returns the stored position.
    pub fn move_field(&mut self, index: usize, x: f32, y: f32) -> Result<(f32, f32), BadgeError> {
        let (x, y) = crate::geometry::clamp_to_template(x, y, self.width, self.height);
        let field = self
            .fields
            .get_mut(index)
            .ok_or_else(|| BadgeError::Template(format!("Invalid field index {}", index)))?;
        field.x = x;
        field.y = y;
        Ok((x, y))
    }

    /// Distinct columns referenced by the fields, in first-use order.
    pub fn columns(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for field in &self.fields {
            if !seen.contains(&field.column.as_str()) {
                seen.push(field.column.as_str());
            }
        }
        seen
    }
}

/// Round-trip `base` through JSON with the allowed keys of `patch` merged in.
fn merge_patch<T>(base: &T, patch: &Map<String, Value>, allowed: &[&str]) -> Result<T, BadgeError>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut value = serde_json::to_value(base)?;
    if let Value::Object(obj) = &mut value {
        for (key, val) in patch {
            if allowed.contains(&key.as_str()) {
                obj.insert(key.clone(), val.clone());
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}
