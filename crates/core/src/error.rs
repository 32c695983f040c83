use thiserror::Error;

/// Reasons a capture session could not be opened.
///
/// Both variants mean the same thing to callers: the detector cannot
/// operate and a non-audio fallback has to be offered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),
}

impl CaptureError {
    /// Maps a platform error description onto the capture error taxonomy.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let denied = ["permission", "denied", "not authorized"]
            .iter()
            .any(|needle| lower.contains(needle));
        if denied {
            CaptureError::PermissionDenied(message)
        } else {
            CaptureError::DeviceUnavailable(message)
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied(_))
    }
}
