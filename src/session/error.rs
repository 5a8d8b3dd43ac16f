use thiserror::Error;

use super::status::SessionPhase;
use crate::capture::{CaptureError, CaptureMode};

/// Everything the session controller can refuse or fail with.
///
/// None of these are fatal: the controller always keeps a path back to Idle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("capture mode is fixed to {0} for this recorder")]
    ModeFixed(CaptureMode),

    #[error("no media was captured, nothing to finalize")]
    ArtifactBuildFailure,

    #[error("no finished recording to download")]
    NoArtifact,

    #[error("device acquisition was cancelled by a pause or stop")]
    AcquisitionCancelled,

    #[error("recording controller is not running")]
    ControllerGone,
}

impl SessionError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ModeFixed(_) => "MODE_FIXED",
            Self::ArtifactBuildFailure => "ARTIFACT_BUILD_FAILURE",
            Self::NoArtifact => "NO_ARTIFACT",
            Self::AcquisitionCancelled => "ACQUISITION_CANCELLED",
            Self::ControllerGone => "CONTROLLER_GONE",
        }
    }
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        Self::DeviceUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TrackKind;

    #[test]
    fn test_capture_errors_map_to_device_unavailable() {
        let err: SessionError = CaptureError::NoDevice(TrackKind::Camera).into();
        assert_eq!(
            err,
            SessionError::DeviceUnavailable("no camera available".to_string())
        );
        assert_eq!(err.code(), "DEVICE_UNAVAILABLE");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = SessionError::InvalidTransition {
            action: "toggle mode",
            phase: SessionPhase::Recording,
        };
        assert_eq!(err.to_string(), "cannot toggle mode while recording");
    }
}
