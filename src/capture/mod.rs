//! Capture capability abstraction.
//!
//! The session controller never touches hardware directly. It asks a
//! [`CaptureService`] for a device stream, attaches a [`ChunkSink`] to it, and
//! hands the stream back when done. Backends decide the container format.

pub mod synthetic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::controller::SessionEvent;

pub use synthetic::{SyntheticCapture, SyntheticOptions};

/// Which media kinds a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Microphone only.
    Audio,
    /// Camera plus microphone.
    Video,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// MIME type of artifacts recorded in this mode.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Audio => "audio/webm",
            Self::Video => "video/webm",
        }
    }

    /// Tracks a device stream for this mode carries.
    pub fn tracks(&self) -> Vec<TrackKind> {
        match self {
            Self::Audio => vec![TrackKind::Microphone],
            Self::Video => vec![TrackKind::Microphone, TrackKind::Camera],
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Audio => Self::Video,
            Self::Video => Self::Audio,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Microphone,
    Camera,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microphone => f.write_str("microphone"),
            Self::Camera => f.write_str("camera"),
        }
    }
}

/// Identifier of a device stream, unique per capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Live handle to microphone/camera hardware.
///
/// Deliberately not `Clone`: whoever holds the value owns the hardware, and
/// releasing it through [`CaptureService::stop_stream`] consumes it.
#[derive(Debug)]
pub struct DeviceStream {
    id: StreamId,
    mode: CaptureMode,
    tracks: Vec<TrackKind>,
}

impl DeviceStream {
    pub fn new(id: StreamId, mode: CaptureMode) -> Self {
        Self {
            id,
            mode,
            tracks: mode.tracks(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn tracks(&self) -> &[TrackKind] {
        &self.tracks
    }
}

/// One fragment of encoded media, in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    data: Vec<u8>,
}

impl MediaChunk {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Delivers chunks from a capture backend into the session controller.
///
/// Sending never blocks, so it is safe to call from a device callback.
#[derive(Clone)]
pub struct ChunkSink {
    stream: StreamId,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ChunkSink {
    pub(crate) fn new(stream: StreamId, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { stream, events }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    /// Hand a chunk to the controller. Returns false once the controller is gone.
    pub fn deliver(&self, data: impl Into<Vec<u8>>) -> bool {
        self.events
            .send(SessionEvent::Chunk {
                stream: self.stream,
                chunk: MediaChunk::new(data),
            })
            .is_ok()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission to access capture devices was denied")]
    PermissionDenied,

    #[error("no {0} available")]
    NoDevice(TrackKind),

    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Host-provided media capture capability.
#[async_trait]
pub trait CaptureService: Send + Sync + 'static {
    /// Ask for a live stream carrying the tracks `mode` needs.
    async fn request_stream(&self, mode: CaptureMode) -> Result<DeviceStream, CaptureError>;

    /// Start delivering encoded chunks for `stream` into `sink`.
    fn on_data(&self, stream: &DeviceStream, sink: ChunkSink) -> Result<(), CaptureError>;

    /// Stop every track of `stream` and give the hardware back.
    ///
    /// A final chunk delivered to the sink before this returns still belongs
    /// to the recording.
    async fn stop_stream(&self, stream: DeviceStream) -> Result<(), CaptureError>;
}
