//! Speech recognition
//!
//! `engine` defines the boundary to a platform speech-to-text backend,
//! `manager` keeps one continuous session alive on top of it, and `stdin`
//! provides a line-fed engine for the CLI.

pub mod engine;
pub mod manager;
pub mod stdin;

pub use engine::{
    RecognitionError, RecognitionSession, SessionEvent, SessionEventSender, SessionOptions,
    SpeechEngine, SpeechError, TranscriptSegment,
};
pub use manager::{RecognitionManager, RecognitionUpdate, RecognitionUpdates};
pub use stdin::LineSpeechEngine;
