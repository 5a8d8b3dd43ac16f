//! Recording session module.
//!
//! Coordinates one capture session at a time: device acquisition, chunk
//! buffering, the elapsed-time ticker, and the downloadable artifact.

pub mod artifact;
pub mod controller;
pub mod error;
pub mod status;
mod timer;

pub use artifact::{Artifact, ArtifactInfo, ArtifactRef, ArtifactStore, ChunkBuffer, Download};
pub use controller::{ControllerOptions, RecordingSessionController, SessionHandle};
pub use error::SessionError;
pub use status::{
    format_elapsed, RecorderVariant, SessionPhase, SessionSnapshot, SessionStatusHandle,
    StreamInfo,
};
