//! Crate-level error type
//!
//! Each subsystem has its own `thiserror` enum; `AuroraError` is what crosses
//! into the UI layer as a user-visible message.

use crate::alert::DispatchError;
use crate::database::DatabaseError;
use crate::speech::{RecognitionError, SpeechError};

/// Errors surfaced to the caller of the alert pipeline
#[derive(Debug, thiserror::Error)]
pub enum AuroraError {
    /// No speech capability on this platform
    #[error("Speech recognition is not supported: {0}")]
    CapabilityUnsupported(String),

    /// Microphone access was refused; protection cannot run until the user grants it
    #[error("Microphone access denied. Please allow microphone access.")]
    PermissionDenied,

    #[error(transparent)]
    Recognition(RecognitionError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("No emergency contacts configured. Please add emergency contacts first.")]
    NoContactsConfigured,

    /// Contact store could not be read
    #[error("Could not load emergency contacts: {0}")]
    Database(#[from] DatabaseError),
}

impl From<RecognitionError> for AuroraError {
    fn from(error: RecognitionError) -> Self {
        match error {
            RecognitionError::PermissionDenied => AuroraError::PermissionDenied,
            other => AuroraError::Recognition(other),
        }
    }
}

impl AuroraError {
    /// Whether the error requires user action before protection can resume
    pub fn is_fatal(&self) -> bool {
        match self {
            AuroraError::CapabilityUnsupported(_) | AuroraError::PermissionDenied => true,
            AuroraError::Recognition(e) => e.is_fatal(),
            // A session that cannot be created or started leaves nothing to restart
            AuroraError::Speech(_) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = AuroraError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AuroraError::PermissionDenied.is_fatal());
        assert!(AuroraError::CapabilityUnsupported("no mic".into()).is_fatal());
        assert!(AuroraError::from(SpeechError::StartFailed("busy".into())).is_fatal());
        assert!(!AuroraError::from(RecognitionError::Other("network".into())).is_fatal());
        assert!(!AuroraError::NoContactsConfigured.is_fatal());
        assert!(!AuroraError::from(DatabaseError::Migration("locked".into())).is_fatal());
    }

    #[test]
    fn test_permission_denied_recognition_error_maps_to_permission_denied() {
        let error = AuroraError::from(RecognitionError::from_code("not-allowed"));
        assert!(matches!(error, AuroraError::PermissionDenied));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            AuroraError::NoContactsConfigured.to_string(),
            "No emergency contacts configured. Please add emergency contacts first."
        );
        assert_eq!(
            AuroraError::from(DatabaseError::ContactNotFound("c0".into())).to_string(),
            "Could not load emergency contacts: Contact not found: c0"
        );
        assert_eq!(
            AuroraError::from(RecognitionError::Other("network".into())).to_string(),
            "Speech recognition error: network"
        );
    }
}
