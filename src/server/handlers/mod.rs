//! HTTP handlers for the server.
//!
//! Every handler returns `Result<_, ApiError>`; errors are sent as
//! `{"error": "..."}` with the given status.

pub mod export;
pub mod fields;
pub mod preview;
pub mod rows;
pub mod template;

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

use crate::error::BadgeError;

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

pub fn bad_request(message: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

pub fn not_found(message: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::NOT_FOUND, message)
}

/// Client mistakes map to 400; everything else is a server fault.
impl From<BadgeError> for (StatusCode, Json<Value>) {
    fn from(e: BadgeError) -> Self {
        let status = match e {
            BadgeError::Template(_) | BadgeError::Data(_) | BadgeError::Image(_) | BadgeError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            BadgeError::Pdf(_) | BadgeError::Server(_) | BadgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, e)
    }
}
