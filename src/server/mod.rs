//! # HTTP Server for the Badge Editor
//!
//! Exposes the editing session (template, fields, rows, background) and
//! background PDF exports over a JSON API.
//!
//! ## Usage
//!
//! ```bash
//! badgeforge serve --listen 127.0.0.1:5000 --work-dir /tmp/badges
//! ```
//!
//! Mutating requests are only accepted from local pages: a request whose
//! `Origin` (or `Referer`) names any host other than `localhost`/`127.0.0.1`
//! is rejected with 403.

mod handlers;
mod state;

pub use state::{AppState, ServerConfig, Session};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::BadgeError;
use handlers::api_error;
use state::TASK_EXPIRATION_SECS;

/// Build the router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload_limit;

    Router::new()
        // Template and page config
        .route(
            "/api/config",
            get(handlers::template::get_config).put(handlers::template::put_config),
        )
        .route(
            "/api/template",
            get(handlers::template::get_template).post(handlers::template::put_template),
        )
        .route("/api/fonts", get(handlers::template::fonts))
        // Fields
        .route(
            "/api/fields",
            get(handlers::fields::list).post(handlers::fields::create),
        )
        .route(
            "/api/fields/:idx",
            put(handlers::fields::update).delete(handlers::fields::remove),
        )
        .route("/api/fields/:idx/move", post(handlers::fields::move_field))
        // Background (upload size limited)
        .route(
            "/api/background",
            get(handlers::preview::get_background)
                .post(handlers::preview::upload_background)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Rows
        .route(
            "/api/rows",
            post(handlers::rows::load).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/rows/info", get(handlers::rows::info))
        .route("/api/rows/append", post(handlers::rows::append))
        .route("/api/rows/search", get(handlers::rows::search))
        .route("/api/rows/next-number", get(handlers::rows::next_number))
        .route(
            "/api/rows/:idx",
            get(handlers::rows::get)
                .put(handlers::rows::update)
                .delete(handlers::rows::remove),
        )
        // Previews
        .route("/api/preview/custom", post(handlers::preview::custom))
        .route("/api/preview/:row", get(handlers::preview::row))
        // Export
        .route("/api/export", post(handlers::export::start))
        .route("/api/export/:id", get(handlers::export::status))
        .route("/api/export/:id/cancel", post(handlers::export::cancel))
        .route("/api/export/:id/download", get(handlers::export::download))
        .route("/api/export-single-pdf/:row", get(handlers::export::single_pdf))
        .route("/api/export-single-image/:row", get(handlers::export::single_image))
        .layer(middleware::from_fn(local_origin_only))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Host part of an `Origin`/`Referer` value (`scheme://host[:port][/path]`).
fn origin_host(value: &str) -> Option<&str> {
    let rest = value.split_once("://").map(|(_, rest)| rest)?;
    let authority = rest.split('/').next()?;
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next();
    }
    authority.split(':').next()
}

fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Reject cross-origin mutating requests.
///
/// Requests without `Origin` or `Referer` (curl, scripts) pass.
async fn local_origin_only(request: Request, next: Next) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }
    let headers = request.headers();
    let source = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok());

    if let Some(source) = source {
        let allowed = origin_host(source).is_some_and(is_local_host);
        if !allowed {
            warn!(origin = source, path = %request.uri().path(), "Rejected cross-origin request");
            return api_error(StatusCode::FORBIDDEN, "Cross-origin request rejected").into_response();
        }
    }
    next.run(request).await
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use badgeforge::render::FontBook;
/// use badgeforge::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), badgeforge::error::BadgeError> {
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:5000".to_string(),
///     work_dir: "/tmp/badges".into(),
///     upload_limit: 16 * 1024 * 1024,
/// };
///
/// serve(config, FontBook::with_system_default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig, fonts: crate::render::FontBook) -> Result<(), BadgeError> {
    std::fs::create_dir_all(&config.work_dir)?;
    let app_state = Arc::new(AppState::new(config.clone(), fonts));

    // Spawn background task cleanup
    tokio::spawn(cleanup_tasks(app_state.clone()));

    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| BadgeError::Server(format!("Failed to bind to {}: {}", config.listen_addr, e)))?;

    info!(
        listen = %config.listen_addr,
        work_dir = %config.work_dir.display(),
        "badgeforge server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| BadgeError::Server(format!("Server error: {}", e)))?;

    Ok(())
}

/// Drop finished export tasks older than an hour, along with their PDFs.
async fn cleanup_tasks(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    let expiration = chrono::Duration::seconds(TASK_EXPIRATION_SECS);

    loop {
        interval.tick().await;
        let now = Utc::now();

        let expired: Vec<_> = {
            let mut tasks = state.tasks.write().await;
            let ids: Vec<String> = tasks
                .iter()
                .filter(|(_, handle)| {
                    handle
                        .snapshot()
                        .finished_at
                        .is_some_and(|done| now - done > expiration)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter().filter_map(|id| tasks.remove(&id)).collect()
        };

        for handle in &expired {
            let task = handle.snapshot();
            if let Err(e) = tokio::fs::remove_file(&task.output).await {
                warn!(task = %task.id, error = %e, "Failed to remove expired export");
            }
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "Cleaned up expired export tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_host() {
        assert_eq!(origin_host("http://localhost:5000"), Some("localhost"));
        assert_eq!(origin_host("http://127.0.0.1:5000/editor"), Some("127.0.0.1"));
        assert_eq!(origin_host("https://evil.example.com"), Some("evil.example.com"));
        assert_eq!(origin_host("http://[::1]:5000/"), Some("::1"));
        assert_eq!(origin_host("null"), None);
    }

    #[test]
    fn test_local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(!is_local_host("localhost.evil.com"));
        assert!(!is_local_host("10.0.0.1"));
    }
}
