//! Background PDF export handlers.
//!
//! `POST /api/export` snapshots the session and starts a worker on the
//! blocking pool; the client polls the task, may cancel it, and downloads the
//! PDF once it is done.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use image::RgbaImage;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data::{Row, SingleRow};
use crate::export::{ExportHandle, ExportStatus, ExportTask, PdfSink, export_all, export_pdf_file};
use crate::render::{encode_png, render_values};
use crate::template::Template;

use super::super::state::AppState;
use super::{ApiError, api_error, bad_request, not_found};

async fn find_task(state: &AppState, id: &str) -> Result<ExportHandle, ApiError> {
    state
        .tasks
        .read()
        .await
        .get(id)
        .cloned()
        .ok_or_else(|| not_found("Task not found"))
}

/// POST /api/export - Start exporting every row to a PDF.
pub async fn start(State(state): State<Arc<AppState>>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (template, rows, background) = {
        let session = state.session.read().await;
        if !session.rows.is_loaded() {
            return Err(bad_request("No row data loaded"));
        }
        (session.template.clone(), session.rows.clone(), session.background.clone())
    };
    template.validate()?;

    std::fs::create_dir_all(&state.config.work_dir)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Work dir unavailable: {}", e)))?;

    let id = Uuid::new_v4().simple().to_string()[..8].to_string();
    let output = state.config.work_dir.join(format!("badges_{}.pdf", id));
    let handle = ExportHandle::new(id.clone(), rows.rows.len(), output.clone());
    state.tasks.write().await.insert(id.clone(), handle.clone());
    info!(task = %id, rows = rows.rows.len(), output = %output.display(), "Starting export");

    let fonts = state.fonts.clone();
    let worker = handle.clone();
    let join = tokio::task::spawn_blocking(move || {
        export_pdf_file(&template, &rows, &output, background.as_deref(), &fonts, &worker);
    });

    // Record a panicked worker instead of leaving the task running forever.
    tokio::spawn(async move {
        if let Err(e) = join.await {
            warn!(error = %e, "Export worker failed");
            handle.fail(format!("Export worker failed: {}", e));
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "task_id": id }))))
}

/// GET /api/export/:id - Task status and progress.
pub async fn status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ExportTask>, ApiError> {
    Ok(Json(find_task(&state, &id).await?.snapshot()))
}

/// POST /api/export/:id/cancel - Request cancellation.
///
/// Takes effect before the next row; the PDF keeps the rows already placed.
pub async fn cancel(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let handle = find_task(&state, &id).await?;
    if handle.snapshot().status.is_terminal() {
        return Err(bad_request("Task already finished"));
    }
    handle.cancel();
    info!(task = %id, "Export cancellation requested");
    Ok(Json(json!({ "task_id": id, "cancelled": true })))
}

/// GET /api/export/:id/download - The finished PDF.
pub async fn download(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let task = find_task(&state, &id).await?.snapshot();
    if task.status != ExportStatus::Done {
        return Err(bad_request("Export not complete"));
    }
    let bytes = tokio::fs::read(&task.output)
        .await
        .map_err(|e| not_found(format!("Export file unavailable: {}", e)))?;
    let disposition = format!("attachment; filename=\"badges_{}.pdf\"", task.id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Snapshot what a single-row export needs, or 404 for a bad row.
async fn single_row_inputs(state: &AppState, idx: usize) -> Result<(Template, Row, Option<Arc<RgbaImage>>), ApiError> {
    let session = state.session.read().await;
    let row = session
        .rows
        .get(idx)
        .cloned()
        .ok_or_else(|| not_found(format!("Row index {} out of range", idx)))?;
    Ok((session.template.clone(), row, session.background.clone()))
}

/// GET /api/export-single-pdf/:row - One badge on a one-page PDF.
pub async fn single_pdf(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> Result<impl IntoResponse, ApiError> {
    let (template, row, background) = single_row_inputs(&state, idx).await?;
    template.validate()?;
    let fonts = state.fonts.clone();

    let bytes = tokio::task::spawn_blocking(move || {
        let (page_width, page_height) = template.page_size.dimensions_pt();
        let mut sink = PdfSink::in_memory(page_width, page_height);
        let report = export_all(&template, &SingleRow(&row), &mut sink, background.as_deref(), &fonts);
        match report.status {
            ExportStatus::Done => Ok(sink.into_inner()),
            _ => Err(report.error.unwrap_or_else(|| "Export did not complete".to_string())),
        }
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))?
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    info!(row = idx, "Exported single badge PDF");
    let disposition = format!("attachment; filename=\"badge_{}.pdf\"", idx + 1);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// GET /api/export-single-image/:row - One badge as a PNG download.
pub async fn single_image(State(state): State<Arc<AppState>>, Path(idx): Path<usize>) -> Result<impl IntoResponse, ApiError> {
    let (template, row, background) = single_row_inputs(&state, idx).await?;
    let fonts = state.fonts.clone();

    let png_bytes = tokio::task::spawn_blocking(move || {
        let badge = render_values(&template, &row, background.as_deref(), &fonts);
        encode_png(&badge)
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)))??;

    let disposition = format!("attachment; filename=\"badge_{}.png\"", idx + 1);
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png_bytes,
    ))
}
