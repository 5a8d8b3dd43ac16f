//! Published session state and the shared handle presentation code reads it from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::artifact::ArtifactInfo;
use crate::capture::{CaptureMode, StreamId, TrackKind};

/// Phase of the recording session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Recording,
    Paused,
    Stopped,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which recorder the controller acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderVariant {
    #[serde(rename = "audio")]
    AudioOnly,
    #[serde(rename = "video")]
    VideoOnly,
    #[serde(rename = "switchable")]
    Switchable,
}

impl RecorderVariant {
    pub fn is_switchable(&self) -> bool {
        matches!(self, Self::Switchable)
    }

    /// Mode the recorder starts in. Fixed variants ignore `preferred`.
    pub fn initial_mode(&self, preferred: CaptureMode) -> CaptureMode {
        match self {
            Self::AudioOnly => CaptureMode::Audio,
            Self::VideoOnly => CaptureMode::Video,
            Self::Switchable => preferred,
        }
    }
}

/// Live stream being previewed while recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: StreamId,
    pub tracks: Vec<TrackKind>,
}

/// Point-in-time view of the controller, safe to hand to any reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub variant: RecorderVariant,
    pub mode: CaptureMode,
    pub elapsed_seconds: u64,
    /// `elapsed_seconds` as HH:MM:SS
    pub elapsed: String,
    pub session_id: Option<Uuid>,
    pub live_stream: Option<StreamInfo>,
    pub artifact: Option<ArtifactInfo>,
    pub last_duration_seconds: Option<u64>,
    pub last_error: Option<String>,
    pub warning: Option<String>,
}

impl SessionSnapshot {
    pub fn new(variant: RecorderVariant, mode: CaptureMode) -> Self {
        Self {
            phase: SessionPhase::Idle,
            variant,
            mode,
            elapsed_seconds: 0,
            elapsed: format_elapsed(0),
            session_id: None,
            live_stream: None,
            artifact: None,
            last_duration_seconds: None,
            last_error: None,
            warning: None,
        }
    }
}

/// Thread-safe handle for sharing session state between the controller and readers.
#[derive(Clone)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionSnapshot>>,
}

impl SessionStatusHandle {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub async fn get(&self) -> SessionSnapshot {
        self.inner.lock().await.clone()
    }

    pub async fn set(&self, snapshot: SessionSnapshot) {
        *self.inner.lock().await = snapshot;
    }
}

/// Format seconds as a zero-padded `HH:MM:SS` clock.
pub fn format_elapsed(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let min = (seconds % 3600) / 60;
    let sec = seconds % 60;
    format!("{hrs:02}:{min:02}:{sec:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Acquiring.as_str(), "acquiring");
        assert_eq!(SessionPhase::Recording.as_str(), "recording");
        assert_eq!(SessionPhase::Paused.as_str(), "paused");
        assert_eq!(SessionPhase::Stopped.as_str(), "stopped");
    }

    #[test]
    fn test_session_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Paused).unwrap();
        assert_eq!(json, "\"paused\"");

        let parsed: SessionPhase = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(parsed, SessionPhase::Stopped);
    }

    #[test]
    fn test_variant_initial_mode() {
        assert_eq!(
            RecorderVariant::AudioOnly.initial_mode(CaptureMode::Video),
            CaptureMode::Audio
        );
        assert_eq!(
            RecorderVariant::VideoOnly.initial_mode(CaptureMode::Audio),
            CaptureMode::Video
        );
        assert_eq!(
            RecorderVariant::Switchable.initial_mode(CaptureMode::Video),
            CaptureMode::Video
        );
        assert!(RecorderVariant::Switchable.is_switchable());
        assert!(!RecorderVariant::AudioOnly.is_switchable());
    }

    #[test]
    fn test_variant_serialization() {
        let parsed: RecorderVariant = serde_json::from_str("\"switchable\"").unwrap();
        assert_eq!(parsed, RecorderVariant::Switchable);
        assert_eq!(
            serde_json::to_string(&RecorderVariant::VideoOnly).unwrap(),
            "\"video\""
        );
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(59), "00:00:59");
        assert_eq!(format_elapsed(3725), "01:02:05");
        assert_eq!(format_elapsed(360_000), "100:00:00");
    }

    #[test]
    fn test_snapshot_starts_idle() {
        let snapshot = SessionSnapshot::new(RecorderVariant::AudioOnly, CaptureMode::Audio);
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.elapsed, "00:00:00");
        assert!(snapshot.artifact.is_none());
        assert!(snapshot.live_stream.is_none());
    }

    #[tokio::test]
    async fn test_status_handle_set_and_get() {
        let handle =
            SessionStatusHandle::new(SessionSnapshot::new(RecorderVariant::Switchable, CaptureMode::Audio));
        let mut snapshot = handle.get().await;
        snapshot.phase = SessionPhase::Recording;
        snapshot.elapsed_seconds = 4;
        handle.set(snapshot).await;

        let current = handle.get().await;
        assert_eq!(current.phase, SessionPhase::Recording);
        assert_eq!(current.elapsed_seconds, 4);
    }
}
