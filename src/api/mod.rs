//! Local control API for mediarec.
//!
//! Provides HTTP endpoints for:
//! - Session control (start, pause, stop, toggle mode, status)
//! - Downloading the finished recording

pub mod error;
pub mod routes;

use crate::config::ApiConfig;
use crate::session::SessionHandle;
use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub struct ApiServer {
    host: String,
    port: u16,
    handle: SessionHandle,
}

impl ApiServer {
    pub fn new(handle: SessionHandle, config: &ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            handle,
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = router(self.handle);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {addr}"))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /               - Service info");
        info!("  GET  /version        - Get version info");
        info!("  GET  /status         - Get session status");
        info!("  POST /start          - Start or resume recording");
        info!("  POST /pause          - Pause recording");
        info!("  POST /stop           - Stop and finalize recording");
        info!("  POST /toggle-mode    - Switch between audio and video");
        info!("  GET  /download       - Download the finished recording");
        info!("  GET  /artifacts/:id  - Resolve a recording reference");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Full application router, also used directly by tests.
pub fn router(handle: SessionHandle) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/version", get(version))
        .merge(routes::session::router(handle.clone()))
        .merge(routes::artifacts::router(handle))
        .layer(ServiceBuilder::new())
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "mediarec",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "mediarec"
    }))
}
