//! HTTP surface tests, driven through the router without binding a socket.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use mediarec::api::router;
use mediarec::capture::{SyntheticCapture, SyntheticOptions};
use mediarec::session::{ControllerOptions, RecorderVariant, RecordingSessionController};

const CHUNK_SIZE: usize = 64;

fn app(options: SyntheticOptions, variant: RecorderVariant) -> Router {
    let capture = Arc::new(SyntheticCapture::new(options));
    let handle = RecordingSessionController::spawn(
        capture,
        ControllerOptions {
            variant,
            ..ControllerOptions::default()
        },
    );
    router(handle)
}

fn synthetic() -> SyntheticOptions {
    SyntheticOptions {
        chunk_interval: Duration::from_millis(100),
        chunk_size: CHUNK_SIZE,
        ..SyntheticOptions::default()
    }
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_idle_session() {
    let app = app(synthetic(), RecorderVariant::Switchable);

    let (status, body) = send_json(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["mode"], "audio");
    assert_eq!(body["elapsed"], "00:00:00");
}

#[tokio::test(start_paused = true)]
async fn test_version_endpoint() {
    let app = app(synthetic(), RecorderVariant::Switchable);

    let (status, body) = send_json(&app, "GET", "/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "mediarec");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_commands_map_to_error_codes() {
    let app = app(synthetic(), RecorderVariant::Switchable);

    let (status, body) = send_json(&app, "POST", "/pause").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, body) = send_json(&app, "GET", "/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_ARTIFACT");
}

#[tokio::test(start_paused = true)]
async fn test_fixed_recorder_toggle_conflicts() {
    let app = app(synthetic(), RecorderVariant::AudioOnly);

    let (status, body) = send_json(&app, "POST", "/toggle-mode").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MODE_FIXED");
}

#[tokio::test(start_paused = true)]
async fn test_denied_permission_is_unavailable() {
    let options = SyntheticOptions {
        deny_permission: true,
        ..synthetic()
    };
    let app = app(options, RecorderVariant::AudioOnly);

    let (status, body) = send_json(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "DEVICE_UNAVAILABLE");

    let (_, body) = send_json(&app, "GET", "/status").await;
    assert_eq!(body["phase"], "idle");
}

#[tokio::test(start_paused = true)]
async fn test_record_and_download_video() {
    let app = app(synthetic(), RecorderVariant::Switchable);

    let (status, body) = send_json(&app, "POST", "/toggle-mode").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "video");

    let (status, body) = send_json(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "recording");

    tokio::time::sleep(Duration::from_millis(350)).await;

    let (status, body) = send_json(&app, "POST", "/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "stopped");
    assert_eq!(body["artifact"]["mime"], "video/webm");
    assert_eq!(body["artifact"]["size_bytes"], 3 * CHUNK_SIZE);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/download").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"recording_video_"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), 3 * CHUNK_SIZE);
    assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
}

#[tokio::test(start_paused = true)]
async fn test_artifact_reference_revoked_on_restart() {
    let app = app(synthetic(), RecorderVariant::AudioOnly);

    send_json(&app, "POST", "/start").await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    let (_, body) = send_json(&app, "POST", "/stop").await;

    let reference = body["artifact"]["reference"].as_str().unwrap().to_string();
    let id = reference.rsplit('/').next().unwrap().to_string();
    let uri = format!("/artifacts/{id}");

    let (status, bytes) = send(&app, "GET", &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes.len(), 2 * CHUNK_SIZE);

    send_json(&app, "POST", "/start").await;

    let (status, body) = send_json(&app, "GET", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
