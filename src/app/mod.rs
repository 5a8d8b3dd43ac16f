use crate::api::ApiServer;
use crate::capture::{CaptureService, SyntheticCapture, SyntheticOptions};
use crate::config::Config;
use crate::session::{ControllerOptions, RecordingSessionController};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

pub async fn run_service() -> Result<()> {
    info!("Starting mediarec service");

    let config = Config::load()?;
    let capture = build_capture(&config);

    let handle = RecordingSessionController::spawn(capture, ControllerOptions::from(&config.recorder));

    let api_server = ApiServer::new(handle.clone(), &config.api);
    let server = tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("mediarec is ready!");
    info!(
        "Try: curl -X POST {}/start && sleep 3 && curl -X POST {}/stop",
        config.api.base_url(),
        config.api.base_url()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        _ = server => error!("API server exited"),
    }

    // Release any device still held before exiting.
    handle.shutdown().await;
    Ok(())
}

fn build_capture(config: &Config) -> Arc<dyn CaptureService> {
    info!("Using {} capture backend", config.capture.backend);
    Arc::new(SyntheticCapture::new(SyntheticOptions::from(&config.capture)))
}
