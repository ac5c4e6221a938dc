//! # badgeforge - Batch Badge Rendering Library
//!
//! badgeforge turns a badge [`Template`] plus tabular row data into badge
//! images, and packs those badges onto fixed-size PDF pages for printing.
//!
//! - **Templates**: canvas size, background, positioned text fields, page grid
//! - **Rendering**: per-row badges with auto-shrinking text
//! - **Layout**: aspect-preserving grid packing in PDF points
//! - **Export**: ordered, cancellable batch export with progress
//!
//! ## Quick Start
//!
//! ```no_run
//! use badgeforge::{
//!     data::Rows,
//!     export::{PdfSink, export_all},
//!     render::FontBook,
//!     template::Template,
//! };
//! use std::path::Path;
//!
//! let template = Template::load(Path::new("template.json"))?;
//! let rows = Rows::load(Path::new("attendees.json"))?;
//! let fonts = FontBook::with_system_default();
//!
//! let (w, h) = template.page_size.dimensions_pt();
//! let mut sink = PdfSink::create(Path::new("badges.pdf"), w, h)?;
//! let report = export_all(&template, &rows, &mut sink, None, &fonts);
//! println!("{:?}: {} of {} badges", report.status, report.processed, report.total);
//!
//! # Ok::<(), badgeforge::error::BadgeError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Template and field model, JSON persistence |
//! | [`data`] | Row data sources |
//! | [`geometry`] | Editor viewport ↔ template coordinate mapping |
//! | [`render`] | Fonts, fields, whole badges |
//! | [`layout`] | Page grid packing |
//! | [`export`] | Batch export driver, page sinks, task handles |
//! | [`server`] | HTTP editing and export API |
//! | [`error`] | Error types |

pub mod data;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layout;
pub mod render;
pub mod server;
pub mod template;

// Re-exports for convenience
pub use data::{DataSource, Rows};
pub use error::BadgeError;
pub use layout::CellLayout;
pub use template::{FieldPlacement, Template};
