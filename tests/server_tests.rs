//! HTTP API tests driving the router directly.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use badgeforge::{
    render::FontBook,
    server::{AppState, ServerConfig, router},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestServer {
    app: Router,
    _dir: tempfile::TempDir,
}

fn server() -> TestServer {
    server_with_fonts(FontBook::new())
}

fn server_with_fonts(fonts: FontBook) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        work_dir: dir.path().to_path_buf(),
        upload_limit: 1024 * 1024,
    };
    let state = Arc::new(AppState::new(config, fonts));
    TestServer {
        app: router(state),
        _dir: dir,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

/// Like [`send`], also returning one response header.
async fn send_with_header(app: &Router, uri: &str, name: header::HeaderName) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let value = response
        .headers()
        .get(&name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, value, bytes.to_vec())
}

async fn wait_for_task(app: &Router, id: &str) -> Value {
    let mut task = Value::Null;
    for _ in 0..600 {
        let (_, body) = send_json(app, Method::GET, &format!("/api/export/{}", id), None).await;
        task = body;
        if task["status"] != "running" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    task
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn load_rows(app: &Router, n: usize) {
    let rows: Vec<Value> = (0..n)
        .map(|i| json!({ "Name": format!("Person {}", i), "Badge": (i + 1).to_string() }))
        .collect();
    let (status, info) = send_json(app, Method::POST, "/api/rows?filename=people.json", Some(json!(rows))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["row_count"], n);
}

#[tokio::test]
async fn test_config_defaults_and_update() {
    let server = server();
    let (status, config) = send_json(&server.app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["columns_per_page"], 2);
    assert_eq!(config["rows_per_page"], 4);
    assert_eq!(config["badges_per_page"], 8);

    let (status, config) = send_json(
        &server.app,
        Method::PUT,
        "/api/config",
        Some(json!({ "columns_per_page": 3, "page_size": "A4", "fields": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["columns_per_page"], 3);
    assert_eq!(config["page_size"], "A4");
    assert_eq!(config["badges_per_page"], 12);

    let (status, _) = send_json(&server.app, Method::PUT, "/api/config", Some(json!({ "rows_per_page": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &server.app,
        Method::PUT,
        "/api/config",
        Some(json!({ "columns_per_page": 65536, "rows_per_page": 65536 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("badges per page"));
    let (status, config) = send_json(&server.app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["badges_per_page"], 12);
}

#[tokio::test]
async fn test_field_lifecycle() {
    let server = server();
    let (status, field) = send_json(
        &server.app,
        Method::POST,
        "/api/fields",
        Some(json!({ "column": "Name", "x": 100, "y": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field["font_family"], "Arial");
    assert_eq!(field["font_size"], 24);

    // `column` is not editable in place; other keys are.
    let (status, field) = send_json(
        &server.app,
        Method::PUT,
        "/api/fields/0",
        Some(json!({ "column": "Other", "font_size": 40, "bold": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field["column"], "Name");
    assert_eq!(field["font_size"], 40);
    assert_eq!(field["bold"], true);

    let (status, _) = send_json(&server.app, Method::PUT, "/api/fields/5", Some(json!({ "x": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&server.app, Method::DELETE, "/api/fields/0", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, fields) = send_json(&server.app, Method::GET, "/api/fields", None).await;
    assert_eq!(fields, json!([]));
}

#[tokio::test]
async fn test_move_field_maps_and_clamps() {
    let server = server();
    send_json(&server.app, Method::POST, "/api/fields", Some(json!({ "column": "Name" }))).await;

    // 1050x600 badge in a 545x320 viewport: scale 0.5, offsets (10, 10).
    let (status, pos) = send_json(
        &server.app,
        Method::POST,
        "/api/fields/0/move",
        Some(json!({ "display_x": 110, "display_y": 60, "viewport_width": 545, "viewport_height": 320 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pos, json!({ "x": 200.0, "y": 100.0 }));

    let (_, pos) = send_json(
        &server.app,
        Method::POST,
        "/api/fields/0/move",
        Some(json!({ "display_x": 5000, "display_y": -40, "viewport_width": 545, "viewport_height": 320 })),
    )
    .await;
    assert_eq!(pos, json!({ "x": 1050.0, "y": 0.0 }));
}

#[tokio::test]
async fn test_rows_editing_and_search() {
    let server = server();
    load_rows(&server.app, 3).await;

    let (status, row) = send_json(&server.app, Method::GET, "/api/rows/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["Name"], "Person 1");

    let (status, appended) = send_json(
        &server.app,
        Method::POST,
        "/api/rows/append",
        Some(json!({ "Name": "Grace Hopper", "Badge": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appended["index"], 3);

    let (_, next) = send_json(&server.app, Method::GET, "/api/rows/next-number?column=Badge", None).await;
    assert_eq!(next["next"], 43);

    let (_, found) = send_json(&server.app, Method::GET, "/api/rows/search?q=grace", None).await;
    assert_eq!(found["total"], 1);
    assert_eq!(found["results"][0]["index"], 3);

    let (status, row) = send_json(&server.app, Method::PUT, "/api/rows/0", Some(json!({ "Name": "Ada" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["Name"], "Ada");
    assert_eq!(row["Badge"], "1");

    let (status, _) = send_json(&server.app, Method::DELETE, "/api/rows/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, info) = send_json(&server.app, Method::GET, "/api/rows/info", None).await;
    assert_eq!(info["row_count"], 4);
    assert_eq!(info["filename"], "people.json");
}

#[tokio::test]
async fn test_rows_info_reports_missing_template_columns() {
    let server = server();
    send_json(&server.app, Method::POST, "/api/fields", Some(json!({ "column": "Title" }))).await;
    load_rows(&server.app, 1).await;
    let (_, info) = send_json(&server.app, Method::GET, "/api/rows/info", None).await;
    assert_eq!(info["missing_columns"], json!(["Title"]));
}

#[tokio::test]
async fn test_preview_png() {
    let server = server();
    send_json(
        &server.app,
        Method::POST,
        "/api/fields",
        Some(json!({ "column": "Name", "x": 525, "y": 250, "max_width": 900 })),
    )
    .await;
    load_rows(&server.app, 2).await;

    let (status, png) = send(&server.app, Method::GET, "/api/preview/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!((image.width(), image.height()), (1050, 600));

    let (status, _) = send(&server.app, Method::GET, "/api/preview/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, png) = send(&server.app, Method::POST, "/api/preview/custom", Some(json!({ "Name": "Custom" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(png.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_export_requires_rows() {
    let server = server();
    let (status, body) = send_json(&server.app, Method::POST, "/api/export", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No row data"));
}

#[tokio::test]
async fn test_export_task_runs_to_download() {
    let server = server();
    send_json(&server.app, Method::PUT, "/api/config", Some(json!({ "width": 300, "height": 180 }))).await;
    send_json(&server.app, Method::POST, "/api/fields", Some(json!({ "column": "Name", "x": 150, "y": 60 }))).await;
    load_rows(&server.app, 10).await;

    let (status, started) = send_json(&server.app, Method::POST, "/api/export", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = started["task_id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 8);

    let task = wait_for_task(&server.app, &id).await;
    assert_eq!(task["status"], "done");
    assert_eq!(task["progress"], 10);
    assert_eq!(task["total"], 10);

    let (status, pdf) = send(&server.app, Method::GET, &format!("/api/export/{}/download", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pdf.starts_with(b"%PDF-"));

    // Finished tasks cannot be cancelled.
    let (status, _) = send_json(&server.app, Method::POST, &format!("/api/export/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_running_export() {
    let server = server();
    load_rows(&server.app, 500).await;

    let (status, started) = send_json(&server.app, Method::POST, "/api/export", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = started["task_id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&server.app, Method::POST, &format!("/api/export/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    let task = wait_for_task(&server.app, &id).await;
    assert_eq!(task["status"], "cancelled");
    assert_eq!(task["error"], Value::Null);
    assert_eq!(task["total"], 500);
    assert!(task["progress"].as_u64().unwrap() < 500);
    assert!(task["finished_at"].is_string());

    let (status, _) = send(&server.app, Method::GET, &format!("/api/export/{}/download", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_background_upload_resizes_template_and_previews() {
    let server = server();
    let red = image::RgbaImage::from_pixel(200, 100, image::Rgba([220, 20, 20, 255]));
    let png = badgeforge::render::encode_png(&red).unwrap();

    let boundary = "badgeforge-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"red.png\"\r\nContent-Type: image/png\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&png);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/background")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let uploaded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(uploaded, json!({ "filename": "red.png", "width": 200, "height": 100 }));

    let (_, config) = send_json(&server.app, Method::GET, "/api/config", None).await;
    assert_eq!(config["width"], 200);
    assert_eq!(config["height"], 100);

    let (status, stored) = send(&server.app, Method::GET, "/api/background", None).await;
    assert_eq!(status, StatusCode::OK);
    let stored = image::load_from_memory(&stored).unwrap().to_rgba8();
    assert_eq!(stored, red);

    load_rows(&server.app, 1).await;
    let (status, preview) = send(&server.app, Method::GET, "/api/preview/0", None).await;
    assert_eq!(status, StatusCode::OK);
    let preview = image::load_from_memory(&preview).unwrap().to_rgba8();
    assert_eq!(preview.dimensions(), (200, 100));
    assert_eq!(preview.get_pixel(0, 0), &image::Rgba([220, 20, 20, 255]));
}

#[tokio::test]
async fn test_background_upload_without_image_field() {
    let server = server();
    let boundary = "badgeforge-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/background")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, _) = send(&server.app, Method::GET, "/api/background", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fonts_lists_registered_families() {
    let server = server();
    let (status, body) = send_json(&server.app, Method::GET, "/api/fonts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "families": [], "has_default": false }));

    let mut fonts = FontBook::new();
    fonts
        .register("DejaVu Sans", false, false, include_bytes!("fixtures/fonts/DejaVuSans.ttf").to_vec())
        .unwrap();
    fonts
        .register("DejaVu Sans", true, false, include_bytes!("fixtures/fonts/DejaVuSans-Bold.ttf").to_vec())
        .unwrap();
    let server = server_with_fonts(fonts);
    let (_, body) = send_json(&server.app, Method::GET, "/api/fonts", None).await;
    assert_eq!(body["families"], json!(["dejavu sans"]));
}

#[tokio::test]
async fn test_single_row_pdf_download() {
    let server = server();
    send_json(&server.app, Method::PUT, "/api/config", Some(json!({ "width": 300, "height": 180 }))).await;
    send_json(&server.app, Method::POST, "/api/fields", Some(json!({ "column": "Name", "x": 150, "y": 60 }))).await;
    load_rows(&server.app, 3).await;

    let (status, disposition, pdf) =
        send_with_header(&server.app, "/api/export-single-pdf/1", header::CONTENT_DISPOSITION).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disposition.as_deref(), Some("attachment; filename=\"badge_2.pdf\""));
    assert!(pdf.starts_with(b"%PDF-"));
    let images = pdf.windows(15).filter(|w| *w == b"/Subtype /Image").count();
    assert_eq!(images, 1);

    let (status, _) = send(&server.app, Method::GET, "/api/export-single-pdf/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_single_row_image_download() {
    let server = server();
    send_json(&server.app, Method::PUT, "/api/config", Some(json!({ "width": 300, "height": 180 }))).await;
    load_rows(&server.app, 2).await;

    let (status, content_type, png) =
        send_with_header(&server.app, "/api/export-single-image/0", header::CONTENT_TYPE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!((image.width(), image.height()), (300, 180));

    let (_, disposition, _) =
        send_with_header(&server.app, "/api/export-single-image/0", header::CONTENT_DISPOSITION).await;
    assert_eq!(disposition.as_deref(), Some("attachment; filename=\"badge_1.png\""));

    let (status, _) = send(&server.app, Method::GET, "/api/export-single-image/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_export_task() {
    let server = server();
    let (status, _) = send_json(&server.app, Method::GET, "/api/export/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cross_origin_mutation_rejected() {
    let server = server();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/fields")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::from(json!({ "column": "Name" }).to_string()))
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/fields")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "http://localhost:5000")
        .body(Body::from(json!({ "column": "Name" }).to_string()))
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Reads are never blocked.
    let request = Request::builder()
        .uri("/api/fields")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
