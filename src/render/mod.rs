//! # Rendering Module
//!
//! Turns a template plus one row of data into a badge image.
//!
//! ## Modules
//!
//! - [`font`]: Font lookup with a never-failing fallback chain, text rasterization
//! - [`field`]: One text field, including auto-shrink to `max_width`
//! - [`badge`]: Background plus every field for one row
//!
//! ## Usage Example
//!
//! ```
//! use badgeforge::data::Rows;
//! use badgeforge::render::{FontBook, render_badge};
//! use badgeforge::template::{FieldPlacement, Template};
//!
//! let mut template = Template::default();
//! template.fields.push(FieldPlacement {
//!     column: "Name".into(),
//!     x: 525.0,
//!     y: 250.0,
//!     max_width: 900,
//!     ..Default::default()
//! });
//! let rows = Rows::from_json(br#"[{"Name": "Ada Lovelace"}]"#).unwrap();
//!
//! let badge = render_badge(&template, &rows, 0, None, &FontBook::new());
//! assert_eq!(badge.dimensions(), (1050, 600));
//! ```

pub mod badge;
pub mod field;
pub mod font;

pub use badge::{decode_image, encode_png, load_background, render_badge, render_values};
pub use field::{FieldLayout, MIN_SHRINK_SIZE, draw_field, fit_font_size};
pub use font::{FontBook, FontFace};
