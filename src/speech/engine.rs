//! Speech engine boundary
//!
//! A `SpeechEngine` creates recognition sessions; a session reports its
//! lifecycle and transcript segments as `SessionEvent`s on the channel it was
//! created with. The engine emits one event at a time per session.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::capability::Capability;
use crate::config::RecognitionConfig;

/// Options passed to the engine for every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// BCP 47 language tag
    pub language: String,
    /// Keep capturing across utterances
    pub continuous: bool,
    /// Deliver non-final hypotheses
    pub interim_results: bool,
}

impl From<&RecognitionConfig> for SessionOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
        }
    }
}

/// One recognised fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Position of the result within the session, increasing
    pub index: u32,
    pub text: String,
    /// Final results are never revised; interim ones may be replaced at the same index
    pub is_final: bool,
}

impl TranscriptSegment {
    pub fn interim(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            is_final: true,
        }
    }
}

/// Classified recognition session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Microphone access refused; restarting cannot help
    #[error("Microphone access denied. Please allow microphone access.")]
    PermissionDenied,

    /// Silence timeout; the session ends and is restarted
    #[error("No speech detected")]
    NoSpeech,

    /// Session was aborted, usually by our own stop
    #[error("Speech recognition aborted")]
    Aborted,

    #[error("Speech recognition error: {0}")]
    Other(String),
}

impl RecognitionError {
    /// Classify an engine error code
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" | "permission-denied" => {
                RecognitionError::PermissionDenied
            }
            "no-speech" => RecognitionError::NoSpeech,
            "aborted" => RecognitionError::Aborted,
            other => RecognitionError::Other(other.to_string()),
        }
    }

    /// Stops the restart loop and needs user action
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecognitionError::PermissionDenied)
    }

    /// Absorbed by the session manager, never surfaced
    pub fn is_transient(&self) -> bool {
        matches!(self, RecognitionError::NoSpeech | RecognitionError::Aborted)
    }
}

/// Errors creating or starting a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech recognition is not supported: {0}")]
    Unsupported(String),

    #[error("Failed to create speech recognition session: {0}")]
    SessionCreation(String),

    #[error("Failed to start speech recognition: {0}")]
    StartFailed(String),
}

/// Lifecycle and result events from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    Transcript(TranscriptSegment),
    Error(RecognitionError),
    Ended,
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// A live capture session handle
pub trait RecognitionSession: Send {
    /// Begin capture. May be called again after `Ended` to reuse the handle.
    fn start(&mut self) -> Result<(), SpeechError>;

    /// End capture; the engine follows up with `Ended`
    fn stop(&mut self);
}

/// Platform speech-to-text backend
pub trait SpeechEngine: Send + Sync {
    /// Report whether speech capture is available at all
    fn probe(&self) -> Capability;

    fn create_session(
        &self,
        options: &SessionOptions,
        events: SessionEventSender,
    ) -> Result<Box<dyn RecognitionSession>, SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            RecognitionError::from_code("not-allowed"),
            RecognitionError::PermissionDenied
        );
        assert_eq!(
            RecognitionError::from_code("no-speech"),
            RecognitionError::NoSpeech
        );
        assert_eq!(
            RecognitionError::from_code("aborted"),
            RecognitionError::Aborted
        );
        assert_eq!(
            RecognitionError::from_code("network"),
            RecognitionError::Other("network".to_string())
        );
    }

    #[test]
    fn test_error_severity() {
        assert!(RecognitionError::PermissionDenied.is_fatal());
        assert!(!RecognitionError::PermissionDenied.is_transient());
        assert!(RecognitionError::NoSpeech.is_transient());
        assert!(RecognitionError::Aborted.is_transient());
        let other = RecognitionError::Other("audio-capture".to_string());
        assert!(!other.is_fatal());
        assert!(!other.is_transient());
        assert_eq!(other.to_string(), "Speech recognition error: audio-capture");
    }

    #[test]
    fn test_session_options_from_config() {
        let options = SessionOptions::from(&RecognitionConfig::default());
        assert_eq!(options.language, "en-US");
        assert!(options.continuous);
        assert!(options.interim_results);
    }
}
