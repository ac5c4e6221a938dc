//! Template and page configuration handlers.

use axum::{Json, extract::State};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use crate::layout::CellLayout;
use crate::template::{CONFIG_KEYS, Template};

use super::super::state::AppState;
use super::{ApiError, bad_request};

/// Config view: the layout keys plus derived grid geometry.
fn config_json(template: &Template) -> Result<Value, ApiError> {
    let full = serde_json::to_value(template).map_err(bad_request)?;
    let mut config = Map::new();
    for key in CONFIG_KEYS {
        if let Some(value) = full.get(*key) {
            config.insert((*key).to_string(), value.clone());
        }
    }
    config.insert("badges_per_page".to_string(), json!(template.badges_per_page()));
    config.insert(
        "layout".to_string(),
        serde_json::to_value(CellLayout::compute(template)).map_err(bad_request)?,
    );
    Ok(Value::Object(config))
}

/// GET /api/config - Page grid and badge dimensions.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let session = state.session.read().await;
    Ok(Json(config_json(&session.template)?))
}

/// PUT /api/config - Partial update of the layout keys.
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.session.write().await;
    session.template.apply_config_patch(&patch)?;
    info!(
        columns = session.template.columns_per_page,
        rows = session.template.rows_per_page,
        page_size = session.template.page_size.as_str(),
        "Updated page config"
    );
    Ok(Json(config_json(&session.template)?))
}

/// GET /api/template - The whole template.
pub async fn get_template(State(state): State<Arc<AppState>>) -> Json<Template> {
    Json(state.session.read().await.template.clone())
}

/// POST /api/template - Replace the template.
///
/// The background path in the body is ignored; the session keeps its
/// uploaded background.
pub async fn put_template(
    State(state): State<Arc<AppState>>,
    Json(mut template): Json<Template>,
) -> Result<Json<Template>, ApiError> {
    template.validate()?;
    let mut session = state.session.write().await;
    template.background = session.template.background.take();
    session.template = template;
    info!(fields = session.template.fields.len(), "Replaced template");
    Ok(Json(session.template.clone()))
}

/// GET /api/fonts - Registered families and whether a system default was found.
pub async fn fonts(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "families": state.fonts.families(),
        "has_default": state.fonts.has_default(),
    }))
}
