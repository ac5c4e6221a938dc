//! Row data handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use crate::data::{Row, Rows, row_from_object};

use super::super::state::AppState;
use super::{ApiError, bad_request, not_found};

/// Summary of the loaded data.
#[derive(Debug, Serialize)]
pub struct RowsInfo {
    pub loaded: bool,
    pub filename: Option<String>,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// Columns used by the template that the data does not have.
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct NextNumberQuery {
    pub column: String,
}

/// Maximum number of search hits returned.
const SEARCH_LIMIT: usize = 50;

fn row_info(rows: &Rows, filename: Option<String>, template_columns: Vec<&str>) -> RowsInfo {
    let missing_columns = template_columns
        .into_iter()
        .filter(|c| !rows.headers.iter().any(|h| h == c))
        .map(str::to_string)
        .collect();
    RowsInfo {
        loaded: rows.is_loaded(),
        filename,
        headers: rows.headers.clone(),
        row_count: rows.rows.len(),
        missing_columns,
    }
}

/// POST /api/rows?filename= - Replace the data set from a JSON body.
pub async fn load(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoadQuery>,
    body: Bytes,
) -> Result<Json<RowsInfo>, ApiError> {
    let rows = Rows::from_json(&body)?;
    let mut session = state.session.write().await;
    info!(rows = rows.rows.len(), headers = rows.headers.len(), "Loaded row data");
    session.rows = rows;
    session.rows_filename = query.filename;
    let info = row_info(&session.rows, session.rows_filename.clone(), session.template.columns());
    Ok(Json(info))
}

/// GET /api/rows/info
pub async fn info(State(state): State<Arc<AppState>>) -> Json<RowsInfo> {
    let session = state.session.read().await;
    Json(row_info(&session.rows, session.rows_filename.clone(), session.template.columns()))
}

/// GET /api/rows/:idx
pub async fn get(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> Result<Json<Row>, ApiError> {
    let session = state.session.read().await;
    session
        .rows
        .get(idx)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(format!("Row index {} out of range", idx)))
}

/// POST /api/rows/append - Add a row; returns its index.
pub async fn append(
    State(state): State<Arc<AppState>>,
    Json(values): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if values.is_empty() {
        return Err(bad_request("Row must have at least one value"));
    }
    let mut session = state.session.write().await;
    let index = session.rows.append(row_from_object(values));
    let total = session.rows.rows.len();
    Ok((StatusCode::CREATED, Json(json!({ "index": index, "row_count": total }))))
}

/// PUT /api/rows/:idx - Merge values into a row.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(idx): Path<usize>,
    Json(values): Json<Map<String, Value>>,
) -> Result<Json<Row>, ApiError> {
    let mut session = state.session.write().await;
    session
        .rows
        .update(idx, row_from_object(values))
        .map(|row| Json(row.clone()))
        .map_err(not_found)
}

/// DELETE /api/rows/:idx
pub async fn remove(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> Result<Json<Row>, ApiError> {
    let mut session = state.session.write().await;
    session.rows.remove(idx).map(Json).map_err(not_found)
}

/// GET /api/rows/search?q= - Case-insensitive search over all values.
pub async fn search(State(state): State<Arc<AppState>>, Query(query): Query<SearchQuery>) -> Json<Value> {
    let session = state.session.read().await;
    let hits = session.rows.search(&query.q);
    let total = hits.len();
    let results: Vec<Value> = hits
        .into_iter()
        .take(SEARCH_LIMIT)
        .map(|hit| json!({ "index": hit.index, "row": hit.row }))
        .collect();
    Json(json!({ "results": results, "total": total }))
}

/// GET /api/rows/next-number?column= - Next free integer in a column.
pub async fn next_number(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextNumberQuery>,
) -> Json<Value> {
    let session = state.session.read().await;
    Json(json!({ "column": query.column, "next": session.rows.next_number(&query.column) }))
}
