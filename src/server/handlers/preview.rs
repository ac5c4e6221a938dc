//! Badge preview and background handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use image::RgbaImage;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::data::{Row, row_from_object};
use crate::render::{FontBook, decode_image, encode_png, render_values};
use crate::template::Template;

use super::super::state::AppState;
use super::{ApiError, api_error, bad_request, not_found};

/// Response from the background upload endpoint.
#[derive(Debug, Serialize)]
pub struct BackgroundResponse {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Render and PNG-encode on the blocking pool.
async fn render_png(
    template: Template,
    values: Row,
    background: Option<Arc<RgbaImage>>,
    fonts: Arc<FontBook>,
) -> Result<impl IntoResponse, ApiError> {
    let png_bytes = tokio::task::spawn_blocking(move || {
        let badge = render_values(&template, &values, background.as_deref(), &fonts);
        encode_png(&badge)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))??;

    Ok(([(header::CONTENT_TYPE, "image/png")], png_bytes))
}

/// GET /api/preview/:row - PNG of one data row.
pub async fn row(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> Result<impl IntoResponse, ApiError> {
    let (template, values, background) = {
        let session = state.session.read().await;
        let values = session
            .rows
            .get(idx)
            .cloned()
            .ok_or_else(|| not_found(format!("Row index {} out of range", idx)))?;
        (session.template.clone(), values, session.background.clone())
    };
    render_png(template, values, background, state.fonts.clone()).await
}

/// POST /api/preview/custom - PNG from ad-hoc values.
pub async fn custom(
    State(state): State<Arc<AppState>>,
    Json(values): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let (template, background) = {
        let session = state.session.read().await;
        (session.template.clone(), session.background.clone())
    };
    render_png(template, row_from_object(values), background, state.fonts.clone()).await
}

/// POST /api/background - Upload a background image.
///
/// The template takes the image's pixel size.
pub async fn upload_background(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BackgroundResponse>, ApiError> {
    let mut image_data: Option<Vec<u8>> = None;
    let mut filename = String::from("background");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("image") {
            if let Some(name) = field.file_name() {
                filename = name.to_string();
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read image: {}", e)))?;
            image_data = Some(bytes.to_vec());
            break;
        }
    }

    let image_bytes = image_data.ok_or_else(|| bad_request("No image field found"))?;
    let image = tokio::task::spawn_blocking(move || decode_image(&image_bytes))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))??;
    let (width, height) = image.dimensions();

    let mut session = state.session.write().await;
    session.template.width = width;
    session.template.height = height;
    session.template.background = None;
    session.background = Some(Arc::new(image));
    session.background_filename = Some(filename.clone());
    info!(filename = %filename, width, height, "Loaded background");

    Ok(Json(BackgroundResponse { filename, width, height }))
}

/// GET /api/background - The current background as PNG.
pub async fn get_background(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let background = state
        .session
        .read()
        .await
        .background
        .clone()
        .ok_or_else(|| not_found("No background loaded"))?;
    let png_bytes = tokio::task::spawn_blocking(move || encode_png(&background))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))??;
    Ok(([(header::CONTENT_TYPE, "image/png")], png_bytes))
}
