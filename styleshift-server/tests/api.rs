//! HTTP-level tests driving the router directly, no socket involved.

use std::path::Path;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use clap::Parser;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use styleshift_server::{config::Args, startup::build_app};
use tempfile::TempDir;
use tower::ServiceExt;

fn args(dir: &Path, backend: &str) -> Args {
    let path = |name: &str| dir.join(name).display().to_string();
    Args::parse_from([
        "styleshift-server".to_string(),
        "--cpu".to_string(),
        "--backend".to_string(),
        backend.to_string(),
        "--products-dir".to_string(),
        path("products"),
        "--results-dir".to_string(),
        path("results"),
        "--models-dir".to_string(),
        path("models"),
    ])
}

fn setup(backend: &str) -> (TempDir, Args) {
    let dir = tempfile::tempdir().unwrap();
    let args = args(dir.path(), backend);
    std::fs::create_dir_all(&args.products_dir).unwrap();
    image::RgbImage::from_fn(300, 400, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 77]))
        .save(args.products_dir.join("p1.jpg"))
        .unwrap();
    (dir, args)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_transfer(product_id: &str, style_id: &str) -> Request<Body> {
    Request::post("/api/transfer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "product_id": product_id, "style_id": style_id }).to_string(),
        ))
        .unwrap()
}

fn result_files(args: &Args) -> Vec<String> {
    std::fs::read_dir(&args.results_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

async fn wait_for(path: &Path) -> bool {
    for _ in 0..200 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn health_is_healthy_with_iso_timestamp() {
    let (_dir, args) = setup("passthrough");
    let (app, _workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    let timestamp = body["timestamp"].as_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(timestamp).unwrap();
}

#[tokio::test]
async fn styles_lists_the_catalog_in_order() {
    let (_dir, args) = setup("generator");
    let (app, _workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, get("/api/styles")).await;
    assert_eq!(status, StatusCode::OK);
    let styles = body.as_array().unwrap();
    assert_eq!(styles.len(), 4);
    assert_eq!(
        styles[0],
        json!({ "id": "s1", "name": "Monochrome", "description": "Classic black and white style" })
    );
    let names: Vec<_> = styles.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Monochrome", "Vintage", "Nature", "Neon"]);
}

#[tokio::test]
async fn unknown_style_is_rejected_before_scheduling() {
    let (_dir, args) = setup("passthrough");
    let (app, workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, post_transfer("p1", "s42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("s42"));

    drop(app);
    workers.drain().await;
    assert!(result_files(&args).is_empty());
}

#[tokio::test]
async fn path_like_product_ids_are_rejected() {
    let (_dir, args) = setup("passthrough");
    let (app, _workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, post_transfer("../../etc/passwd", "s1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn transfer_returns_immediately_and_image_appears_later() {
    let (_dir, args) = setup("passthrough");
    let (app, workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, post_transfer("p1", "s1")).await;
    assert_eq!(status, StatusCode::OK);

    let id = body["id"].as_str().unwrap();
    uuid::Uuid::parse_str(id).unwrap();
    assert_eq!(body["product_id"], "p1");
    assert_eq!(body["style_id"], "s1");
    chrono::DateTime::parse_from_rfc3339(body["created_at"].as_str().unwrap()).unwrap();

    let file_name = format!("p1_s1_{id}.jpg");
    assert_eq!(body["image_url"], format!("/images/{file_name}"));

    let output = args.results_dir.join(&file_name);
    assert!(wait_for(&output).await, "{} never appeared", output.display());

    let response = app
        .clone()
        .oneshot(get(&format!("/images/{file_name}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let served = image::load_from_memory(&bytes).unwrap();
    assert_eq!((served.width(), served.height()), (256, 341));

    drop(app);
    workers.drain().await;
    assert_eq!(result_files(&args), vec![file_name]);
}

/// A failed background job has no notification channel: the promised file
/// simply never shows up.
#[tokio::test]
async fn failed_generation_never_produces_the_file() {
    let (_dir, args) = setup("generator");
    let (app, workers) = build_app(&args).unwrap();

    let (status, body) = send(&app, post_transfer("p1", "s3")).await;
    assert_eq!(status, StatusCode::OK);
    let image_url = body["image_url"].as_str().unwrap().to_string();
    let file_name = image_url.trim_start_matches("/images/");
    assert!(!args.results_dir.join(file_name).exists());

    drop(app);
    workers.drain().await;
    assert!(!args.results_dir.join(file_name).exists());
    assert!(result_files(&args).is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let (_dir, args) = setup("passthrough");
    let (app, _workers) = build_app(&args).unwrap();

    let request = Request::post("/api/transfer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"product_id": "p1"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert!(status.is_client_error(), "{status}");
}
