//! # Error Types
//!
//! This module defines error types used throughout the badgeforge library.
//!
//! Recoverable problems (a background that will not decode, a font that
//! cannot be found, a missing data column) never show up here; the renderer
//! absorbs them. What remains is I/O, encoding, and malformed input.

use thiserror::Error;

/// Main error type for badgeforge operations
#[derive(Debug, Error)]
pub enum BadgeError {
    /// Template is missing or violates its invariants
    #[error("Template error: {0}")]
    Template(String),

    /// Row data could not be read or addressed
    #[error("Data error: {0}")]
    Data(String),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Document assembly error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// HTTP server error (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
