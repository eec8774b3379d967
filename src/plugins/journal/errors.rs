use thiserror::Error;

use crate::shared::errors::StorageError;

use super::media::HostError;

/// Top-level error type for journal capture operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    #[error("Device access was denied: {0}")]
    PermissionDenied(String),
    #[error("Failed to acquire device: {0}")]
    DeviceAcquisition(String),
    #[error("Screen capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("No supported recording format: {0}")]
    EncodingUnsupported(String),
    #[error("Persistence request failed (status {status}): {message}")]
    Persistence { status: u16, message: String },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Recording coordinator is not running")]
    CoordinatorUnavailable,
}

impl JournalError {
    pub fn persistence(status: u16, message: impl Into<String>) -> Self {
        JournalError::Persistence {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the user can resolve this by retrying the same action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            JournalError::PermissionDenied(_)
                | JournalError::DeviceAcquisition(_)
                | JournalError::CaptureUnavailable(_)
                | JournalError::Persistence { .. }
        )
    }

    /// Maps a host failure raised while acquiring camera or microphone.
    pub fn from_device(error: HostError) -> Self {
        match error {
            HostError::NotAllowed(msg) => JournalError::PermissionDenied(msg),
            other => JournalError::DeviceAcquisition(other.to_string()),
        }
    }
}

impl From<StorageError> for JournalError {
    fn from(error: StorageError) -> Self {
        JournalError::Storage(error.to_string())
    }
}
