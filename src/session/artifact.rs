//! Finalized recordings and the revocable references that point at them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::error::SessionError;
use crate::capture::{CaptureMode, MediaChunk};

const REF_PREFIX: &str = "blob:mediarec/";

/// Revocable handle to a finalized recording, in the shape of an object URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    fn generate() -> Self {
        Self(format!("{REF_PREFIX}{}", Uuid::new_v4()))
    }

    /// Rebuild a reference from its id segment, as used in `/artifacts/{id}`.
    pub fn from_id(id: &str) -> Self {
        Self(format!("{REF_PREFIX}{id}"))
    }

    pub fn id(&self) -> &str {
        self.0.strip_prefix(REF_PREFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chunks of the current session, in capture order.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<MediaChunk>,
    total_bytes: usize,
}

impl ChunkBuffer {
    /// Append a chunk. Empty chunks carry nothing and are dropped.
    pub fn push(&mut self, chunk: MediaChunk) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn concat(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk.as_bytes());
        }
        data
    }
}

/// A finished recording. Immutable once built.
#[derive(Debug)]
pub struct Artifact {
    mode: CaptureMode,
    data: Vec<u8>,
    created_at: DateTime<Local>,
    duration_seconds: u64,
}

impl Artifact {
    /// Concatenate every buffered chunk into one blob tagged for `mode`.
    pub fn from_chunks(
        chunks: ChunkBuffer,
        mode: CaptureMode,
        duration_seconds: u64,
    ) -> Result<Self, SessionError> {
        if chunks.is_empty() {
            return Err(SessionError::ArtifactBuildFailure);
        }

        Ok(Self {
            mode,
            data: chunks.concat(),
            created_at: Local::now(),
            duration_seconds,
        })
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn mime_type(&self) -> &'static str {
        self.mode.mime_type()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// `recording_{mode}_{timestamp}.webm`, stable for the artifact's lifetime.
    pub fn filename(&self) -> String {
        format!(
            "recording_{}_{}.webm",
            self.mode.as_str(),
            self.created_at.format("%Y%m%d-%H%M%S")
        )
    }
}

/// Summary of an artifact as published to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub reference: ArtifactRef,
    pub mode: CaptureMode,
    pub mime: String,
    pub size_bytes: usize,
    pub filename: String,
    pub duration_seconds: u64,
}

impl ArtifactInfo {
    pub fn describe(reference: ArtifactRef, artifact: &Artifact) -> Self {
        Self {
            reference,
            mode: artifact.mode(),
            mime: artifact.mime_type().to_string(),
            size_bytes: artifact.size_bytes(),
            filename: artifact.filename(),
            duration_seconds: artifact.duration_seconds(),
        }
    }
}

/// What a presentation layer needs to offer the recording for download.
pub type Download = ArtifactInfo;

/// Registry of live artifact references.
#[derive(Clone, Default)]
pub struct ArtifactStore {
    inner: Arc<RwLock<HashMap<ArtifactRef, Arc<Artifact>>>>,
}

impl ArtifactStore {
    /// Mint a fresh reference for `artifact` and make it resolvable.
    pub async fn register(&self, artifact: Artifact) -> ArtifactInfo {
        let info = ArtifactInfo::describe(ArtifactRef::generate(), &artifact);
        debug!(
            "Registering {} ({} bytes, {})",
            info.reference, info.size_bytes, info.mime
        );
        self.inner
            .write()
            .await
            .insert(info.reference.clone(), Arc::new(artifact));
        info
    }

    pub async fn resolve(&self, reference: &ArtifactRef) -> Option<Arc<Artifact>> {
        self.inner.read().await.get(reference).cloned()
    }

    /// Release a reference. Returns false when it was not live.
    pub async fn revoke(&self, reference: &ArtifactRef) -> bool {
        let removed = self.inner.write().await.remove(reference).is_some();
        if removed {
            debug!("Revoked {}", reference);
        }
        removed
    }

    /// Release every live reference. Returns how many were live.
    pub async fn revoke_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let count = inner.len();
        inner.clear();
        count
    }

    pub async fn live_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(sizes: &[usize]) -> ChunkBuffer {
        let mut chunks = ChunkBuffer::default();
        for (i, size) in sizes.iter().enumerate() {
            chunks.push(MediaChunk::new(vec![i as u8; *size]));
        }
        chunks
    }

    #[test]
    fn test_chunk_buffer_skips_empty_chunks() {
        let mut chunks = ChunkBuffer::default();
        assert!(chunks.push(MediaChunk::new(vec![1, 2])));
        assert!(!chunks.push(MediaChunk::new(Vec::new())));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks.total_bytes(), 2);
    }

    #[test]
    fn test_artifact_concatenates_in_arrival_order() {
        let artifact = Artifact::from_chunks(buffer(&[2, 1, 3]), CaptureMode::Audio, 3).unwrap();
        assert_eq!(artifact.data(), &[0, 0, 1, 2, 2, 2]);
        assert_eq!(artifact.size_bytes(), 6);
        assert_eq!(artifact.mime_type(), "audio/webm");
        assert_eq!(artifact.duration_seconds(), 3);
    }

    #[test]
    fn test_empty_buffer_fails_to_build() {
        let err = Artifact::from_chunks(ChunkBuffer::default(), CaptureMode::Video, 0).unwrap_err();
        assert_eq!(err, SessionError::ArtifactBuildFailure);
    }

    #[test]
    fn test_filename_convention() {
        let artifact = Artifact::from_chunks(buffer(&[1]), CaptureMode::Video, 1).unwrap();
        let name = artifact.filename();
        assert!(name.starts_with("recording_video_"));
        assert!(name.ends_with(".webm"));
        assert_eq!(name, artifact.filename());
    }

    #[test]
    fn test_reference_id_round_trip() {
        let reference = ArtifactRef::generate();
        assert!(reference.as_str().starts_with("blob:mediarec/"));
        assert_eq!(ArtifactRef::from_id(reference.id()), reference);
    }

    #[tokio::test]
    async fn test_store_register_resolve_revoke() {
        let store = ArtifactStore::default();
        let artifact = Artifact::from_chunks(buffer(&[4]), CaptureMode::Audio, 1).unwrap();
        let info = store.register(artifact).await;
        let reference = info.reference.clone();
        assert_eq!(info.mime, "audio/webm");
        assert_eq!(info.size_bytes, 4);

        assert_eq!(store.live_count().await, 1);
        let resolved = store.resolve(&reference).await.unwrap();
        assert_eq!(resolved.size_bytes(), 4);

        assert!(store.revoke(&reference).await);
        assert!(!store.revoke(&reference).await);
        assert!(store.resolve(&reference).await.is_none());
        assert_eq!(store.live_count().await, 0);
    }

    #[tokio::test]
    async fn test_revoke_all_reports_count() {
        let store = ArtifactStore::default();
        for size in [2, 3] {
            let artifact = Artifact::from_chunks(buffer(&[size]), CaptureMode::Video, 0).unwrap();
            store.register(artifact).await;
        }

        assert_eq!(store.revoke_all().await, 2);
        assert_eq!(store.revoke_all().await, 0);
        assert_eq!(store.live_count().await, 0);
    }
}
