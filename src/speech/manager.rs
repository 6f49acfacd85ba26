//! Recognition session manager
//!
//! Owns the live recognition session and keeps it running: an ended session
//! is restarted after a short delay until `stop()` is called or a fatal error
//! arrives. Callers see `start`/`stop` and a stream of `RecognitionUpdate`s;
//! the session handle never leaves this module.
//!
//! Must be used from within a tokio runtime.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::{
    RecognitionError, RecognitionSession, SessionEvent, SessionOptions, SpeechEngine, SpeechError,
    TranscriptSegment,
};
use crate::capability::Capability;
use crate::config::RecognitionConfig;
use crate::error::AuroraError;

/// Updates published to the consumer of the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionUpdate {
    ListeningChanged { listening: bool },
    /// Current best transcript; emitted on every interim and final result
    Transcript { text: String },
    Error { message: String, fatal: bool },
}

pub type RecognitionUpdates = mpsc::UnboundedReceiver<RecognitionUpdate>;

#[derive(Default)]
struct Inner {
    session: Option<Box<dyn RecognitionSession>>,
    /// Bumped whenever a session is replaced or stopped; events tagged with an
    /// older generation are dropped
    generation: u64,
    should_restart: bool,
    listening: bool,
    transcript: String,
    segments: BTreeMap<u32, TranscriptSegment>,
    /// Segments at or below this index already triggered an alert
    consumed_through: Option<u32>,
    error: Option<String>,
    restart_timer: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    restarts: u64,
}

struct Shared {
    engine: Arc<dyn SpeechEngine>,
    capability: Capability,
    options: SessionOptions,
    restart_delay: Duration,
    updates: mpsc::UnboundedSender<RecognitionUpdate>,
    inner: Mutex<Inner>,
}

/// Continuous speech recognition with auto-restart
pub struct RecognitionManager {
    shared: Arc<Shared>,
}

impl RecognitionManager {
    /// Create a manager and the receiver for its updates.
    ///
    /// The engine is probed once here.
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        config: &RecognitionConfig,
    ) -> (Self, RecognitionUpdates) {
        let capability = engine.probe();
        if let Some(reason) = capability.reason() {
            tracing::warn!("Speech recognition unavailable: {}", reason);
        }

        let (updates, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            engine,
            capability,
            options: SessionOptions::from(config),
            restart_delay: config.restart_delay(),
            updates,
            inner: Mutex::new(Inner::default()),
        });
        (Self { shared }, receiver)
    }

    pub fn capability(&self) -> &Capability {
        &self.shared.capability
    }

    pub fn is_supported(&self) -> bool {
        self.shared.capability.is_supported()
    }

    /// Whether the engine reports an active capture right now
    pub fn is_listening(&self) -> bool {
        self.shared.inner.lock().listening
    }

    /// Whether a session is held (possibly between an end and its restart)
    pub fn is_active(&self) -> bool {
        self.shared.inner.lock().session.is_some()
    }

    pub fn transcript(&self) -> String {
        self.shared.inner.lock().transcript.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.inner.lock().error.clone()
    }

    pub fn has_pending_restart(&self) -> bool {
        self.shared
            .inner
            .lock()
            .restart_timer
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Number of automatic restarts since creation
    pub fn restart_count(&self) -> u64 {
        self.shared.inner.lock().restarts
    }

    /// Begin continuous capture. Calling while already active is a no-op.
    pub fn start(&self) -> Result<(), AuroraError> {
        let shared = &self.shared;

        if let Some(reason) = shared.capability.reason() {
            let error = AuroraError::CapabilityUnsupported(reason.to_string());
            shared.report(&mut shared.inner.lock(), &error);
            return Err(error);
        }

        let mut inner = shared.inner.lock();
        if inner.session.is_some() {
            tracing::debug!("Speech recognition already active, ignoring start");
            return Ok(());
        }

        inner.error = None;
        inner.should_restart = true;
        shared.open_session(&mut inner)?;

        tracing::info!(
            "Speech recognition starting (language: {}, continuous: {})",
            shared.options.language,
            shared.options.continuous
        );
        Ok(())
    }

    /// End capture and cancel any pending restart. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();

        inner.should_restart = false;
        if let Some(timer) = inner.restart_timer.take() {
            timer.abort();
        }
        if let Some(mut session) = inner.session.take() {
            session.stop();
            tracing::info!("Speech recognition stopped");
        }
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        inner.generation += 1;

        let was_listening = inner.listening;
        inner.listening = false;
        inner.transcript.clear();
        inner.segments.clear();
        inner.consumed_through = None;

        if was_listening {
            self.shared.emit(RecognitionUpdate::ListeningChanged { listening: false });
        }
    }

    /// Drop the segments seen so far so the same utterance cannot match again.
    ///
    /// Later revisions of those segments are ignored too.
    pub fn rearm(&self) {
        let mut inner = self.shared.inner.lock();
        let last_seen = inner.segments.keys().next_back().copied();
        inner.consumed_through = last_seen.max(inner.consumed_through);
        inner.segments.clear();
        inner.transcript.clear();
    }
}

impl Drop for RecognitionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn emit(&self, update: RecognitionUpdate) {
        if self.updates.send(update).is_err() {
            tracing::trace!("Recognition update dropped, no receiver");
        }
    }

    /// Create a fresh session and start it. Replaces any previous pump.
    fn open_session(self: &Arc<Self>, inner: &mut Inner) -> Result<(), SpeechError> {
        let (events, mut receiver) = mpsc::unbounded_channel();
        let mut session = match self.engine.create_session(&self.options, events) {
            Ok(session) => session,
            Err(e) => {
                self.fail_start(inner, &e);
                return Err(e);
            }
        };

        inner.generation += 1;
        let generation = inner.generation;

        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        let shared = Arc::clone(self);
        inner.pump = Some(tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                shared.handle_event(generation, event);
            }
        }));

        if let Err(e) = session.start() {
            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
            self.fail_start(inner, &e);
            return Err(e);
        }

        inner.session = Some(session);
        Ok(())
    }

    fn fail_start(&self, inner: &mut Inner, error: &SpeechError) {
        tracing::error!("Failed to start speech recognition: {}", error);
        inner.session = None;
        self.report(inner, &AuroraError::from(error.clone()));
    }

    /// Record a user-visible error. Fatal errors end the restart loop.
    fn report(&self, inner: &mut Inner, error: &AuroraError) {
        let fatal = error.is_fatal();
        if fatal {
            inner.should_restart = false;
        }
        inner.error = Some(error.to_string());
        self.emit(RecognitionUpdate::Error {
            message: error.to_string(),
            fatal,
        });
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: SessionEvent) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::trace!("Dropping event from stale session: {:?}", event);
            return;
        }

        match event {
            SessionEvent::Started => {
                tracing::debug!("Speech recognition session started");
                inner.listening = true;
                inner.segments.clear();
                inner.consumed_through = None;
                self.emit(RecognitionUpdate::ListeningChanged { listening: true });
            }
            SessionEvent::Transcript(segment) => {
                if inner
                    .consumed_through
                    .is_some_and(|consumed| segment.index <= consumed)
                {
                    return;
                }
                inner.segments.insert(segment.index, segment);
                let text = best_transcript(&inner.segments);
                tracing::trace!("Transcript: {}", text);
                inner.transcript = text.clone();
                self.emit(RecognitionUpdate::Transcript { text });
            }
            SessionEvent::Error(error) => self.handle_error(&mut inner, error),
            SessionEvent::Ended => {
                tracing::debug!("Speech recognition session ended");
                // Cleared before any restart decision
                inner.listening = false;
                self.emit(RecognitionUpdate::ListeningChanged { listening: false });

                if inner.should_restart && self.options.continuous {
                    self.schedule_restart(&mut inner, generation);
                } else {
                    inner.session = None;
                    // Detach: this task is the pump and ends once the session's sender is gone
                    inner.pump = None;
                }
            }
        }
    }

    fn handle_error(&self, inner: &mut Inner, error: RecognitionError) {
        if error.is_transient() {
            tracing::debug!("{}, continuing", error);
            return;
        }

        let error = AuroraError::from(error);
        if error.is_fatal() {
            tracing::error!("Speech recognition stopped: {}", error);
        } else {
            tracing::warn!("{}", error);
        }
        self.report(inner, &error);
    }

    fn schedule_restart(self: &Arc<Self>, inner: &mut Inner, generation: u64) {
        if let Some(timer) = inner.restart_timer.take() {
            timer.abort();
        }

        tracing::debug!(
            "Restarting speech recognition in {}ms",
            self.restart_delay.as_millis()
        );
        let shared = Arc::clone(self);
        let delay = self.restart_delay;
        inner.restart_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.restart(generation);
        }));
    }

    fn restart(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock();
        inner.restart_timer = None;
        if !inner.should_restart || inner.generation != generation {
            return;
        }

        inner.restarts += 1;
        let retried = match inner.session.as_mut() {
            Some(session) => session.start(),
            None => Err(SpeechError::StartFailed("no session handle".to_string())),
        };

        match retried {
            Ok(()) => tracing::info!("Speech recognition restarted"),
            Err(e) => {
                tracing::warn!("Could not restart session ({}), creating a new one", e);
                if let Some(mut dead) = inner.session.take() {
                    dead.stop();
                }
                if self.open_session(&mut inner).is_err() {
                    tracing::error!("Speech recognition could not be recovered");
                }
            }
        }
    }
}

/// All final segments concatenated in index order, or the latest interim
/// segment while nothing is final yet.
fn best_transcript(segments: &BTreeMap<u32, TranscriptSegment>) -> String {
    let finals: Vec<&str> = segments
        .values()
        .filter(|s| s.is_final)
        .map(|s| s.text.as_str())
        .collect();

    if !finals.is_empty() {
        return finals.concat();
    }

    segments
        .values()
        .rev()
        .find(|s| !s.is_final)
        .map(|s| s.text.clone())
        .unwrap_or_default()
}
