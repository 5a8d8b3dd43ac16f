//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting, pausing and stopping capture (POST /start, /pause, /stop)
//! - Switching between audio and video (POST /toggle-mode)
//! - Reading the published session state (GET /status)

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::ApiResult;
use crate::session::{SessionHandle, SessionSnapshot};

pub fn router(handle: SessionHandle) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/pause", post(pause))
        .route("/stop", post(stop))
        .route("/toggle-mode", post(toggle_mode))
        .route("/status", get(status))
        .with_state(handle)
}

async fn start(State(handle): State<SessionHandle>) -> ApiResult<Json<SessionSnapshot>> {
    info!("Start command received via API");
    Ok(Json(handle.start().await?))
}

async fn pause(State(handle): State<SessionHandle>) -> ApiResult<Json<SessionSnapshot>> {
    info!("Pause command received via API");
    Ok(Json(handle.pause().await?))
}

async fn stop(State(handle): State<SessionHandle>) -> ApiResult<Json<SessionSnapshot>> {
    info!("Stop command received via API");
    Ok(Json(handle.stop().await?))
}

async fn toggle_mode(State(handle): State<SessionHandle>) -> ApiResult<Json<Value>> {
    info!("Toggle mode command received via API");
    let mode = handle.toggle_mode().await?;
    Ok(Json(json!({
        "success": true,
        "mode": mode,
        "message": format!("Capture mode set to {mode}"),
    })))
}

async fn status(State(handle): State<SessionHandle>) -> Json<SessionSnapshot> {
    Json(handle.status().await)
}
