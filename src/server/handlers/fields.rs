//! Field placement handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::geometry::Viewport;
use crate::template::FieldPlacement;

use super::super::state::{AppState, EDITOR_PADDING};
use super::{ApiError, bad_request, not_found};

/// Request body for the move endpoint: a drop point in editor coordinates.
#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub display_x: f32,
    pub display_y: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    pub x: f32,
    pub y: f32,
}

/// GET /api/fields - All fields in draw order.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<FieldPlacement>> {
    Json(state.session.read().await.template.fields.clone())
}

/// POST /api/fields - Append a field. `column` is required.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(field): Json<FieldPlacement>,
) -> Result<(StatusCode, Json<FieldPlacement>), ApiError> {
    if field.column.trim().is_empty() {
        return Err(bad_request("Field column is required"));
    }
    let mut session = state.session.write().await;
    session.template.fields.push(field.clone());
    info!(column = %field.column, index = session.template.fields.len() - 1, "Added field");
    Ok((StatusCode::CREATED, Json(field)))
}

/// PUT /api/fields/:idx - Partial update restricted to the editable keys.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(idx): Path<usize>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<FieldPlacement>, ApiError> {
    let mut session = state.session.write().await;
    let field = session
        .template
        .fields
        .get_mut(idx)
        .ok_or_else(|| not_found(format!("Invalid field index {}", idx)))?;
    field.apply_patch(&patch)?;
    Ok(Json(field.clone()))
}

/// DELETE /api/fields/:idx
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(idx): Path<usize>,
) -> Result<Json<FieldPlacement>, ApiError> {
    let mut session = state.session.write().await;
    if idx >= session.template.fields.len() {
        return Err(not_found(format!("Invalid field index {}", idx)));
    }
    let removed = session.template.fields.remove(idx);
    info!(column = %removed.column, index = idx, "Removed field");
    Ok(Json(removed))
}

/// POST /api/fields/:idx/move - Drop a field at an editor position.
///
/// The badge is assumed to be shown fitted and centered in the given
/// viewport, the way the editor draws it.
pub async fn move_field(
    State(state): State<Arc<AppState>>,
    Path(idx): Path<usize>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let mut session = state.session.write().await;
    if idx >= session.template.fields.len() {
        return Err(not_found(format!("Invalid field index {}", idx)));
    }
    let viewport = Viewport::fit(
        req.viewport_width,
        req.viewport_height,
        session.template.width as f32,
        session.template.height as f32,
        EDITOR_PADDING,
    );
    let (tx, ty) = viewport.to_template(req.display_x, req.display_y);
    let (x, y) = session.template.move_field(idx, tx, ty)?;
    debug!(index = idx, x, y, scale = viewport.scale, "Moved field");
    Ok(Json(MoveResponse { x, y }))
}
