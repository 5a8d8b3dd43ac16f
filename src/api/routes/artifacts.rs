//! Artifact download endpoints.
//!
//! - GET /download resolves the current recording
//! - GET /artifacts/:id resolves a specific reference until it is revoked

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::session::{Artifact, ArtifactRef, SessionError, SessionHandle};

pub fn router(handle: SessionHandle) -> Router {
    Router::new()
        .route("/download", get(download))
        .route("/artifacts/:id", get(get_artifact))
        .with_state(handle)
}

async fn download(State(handle): State<SessionHandle>) -> ApiResult<Response> {
    let download = handle.download().await?;
    let artifact = handle
        .resolve(&download.reference)
        .await
        .ok_or(SessionError::NoArtifact)?;

    info!(
        "Serving {} ({} bytes) as {}",
        download.reference, download.size_bytes, download.filename
    );
    Ok(attachment(&artifact))
}

async fn get_artifact(
    Path(id): Path<String>,
    State(handle): State<SessionHandle>,
) -> ApiResult<Response> {
    let reference = ArtifactRef::from_id(&id);
    let artifact = handle
        .resolve(&reference)
        .await
        .ok_or_else(|| ApiError::not_found(format!("{reference} is not a live recording")))?;

    Ok(attachment(&artifact))
}

fn attachment(artifact: &Arc<Artifact>) -> Response {
    (
        [
            (header::CONTENT_TYPE, artifact.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename()),
            ),
        ],
        artifact.data().to_vec(),
    )
        .into_response()
}
