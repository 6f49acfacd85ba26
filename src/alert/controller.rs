//! Protection controller
//!
//! Wires the pipeline together: recognition updates are fed to the keyword
//! matcher, a match moves the state machine to `Alerting`, snapshots the
//! contacts and location, and hands them to the dispatcher on a background
//! task. A cool-down timer started at the match is the only way back to
//! `Listening`; dispatch completion only updates per-contact statuses.
//!
//! Lock order is controller state, then recognition manager. The recognition
//! manager never calls back into the controller.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::dispatcher::{
    AlertDispatcher, ContactOutcome, DispatchError, NotificationProvider, SmsOutcome,
};
use super::state::{AlertEvent, AlertPhase, AlertStateMachine};
use super::status::AlertCycle;
use crate::config::Config;
use crate::database::{AlertRecord, ContactSource, Database, DispatchOutcome};
use crate::error::AuroraError;
use crate::keywords::{match_keyword, KeywordSet};
use crate::location::{Coordinates, LocationProvider};
use crate::speech::{RecognitionManager, RecognitionUpdate, RecognitionUpdates, SpeechEngine};

/// User-visible notifications from the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertNotice {
    PhaseChanged { phase: AlertPhase },
    KeywordDetected { keyword: String, transcript: String },
    AlertsSent { messages_sent: usize, contacts: usize },
    DispatchFailed { message: String },
    NoContactsConfigured,
    /// The contact store failed while an alert was being raised
    ContactsUnavailable { message: String },
    RecognitionError { message: String, fatal: bool },
}

pub type AlertNotices = mpsc::UnboundedReceiver<AlertNotice>;

/// Read-only view of the pipeline for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSnapshot {
    pub phase: AlertPhase,
    pub is_listening: bool,
    pub transcript: String,
    pub cycle: Option<AlertCycle>,
    /// Alert cycles raised since the controller was created
    pub alerts_triggered: u64,
    pub error: Option<String>,
}

/// External collaborators of the controller
pub struct AlertServices {
    pub engine: Arc<dyn SpeechEngine>,
    pub provider: Arc<dyn NotificationProvider>,
    pub contacts: Arc<dyn ContactSource>,
    pub location: Option<Arc<LocationProvider>>,
    /// Alert cycles are recorded here when set
    pub history: Option<Arc<Database>>,
}

#[derive(Default)]
struct ControllerState {
    machine: AlertStateMachine,
    cycle: Option<AlertCycle>,
    /// Identifies the current cycle; late timers and dispatch results carry an
    /// older id and are dropped
    cycle_id: u64,
    cool_down: Option<JoinHandle<()>>,
    error: Option<String>,
}

struct Shared {
    recognition: RecognitionManager,
    dispatcher: AlertDispatcher,
    contacts: Arc<dyn ContactSource>,
    location: Option<Arc<LocationProvider>>,
    history: Option<Arc<Database>>,
    keywords: RwLock<KeywordSet>,
    cool_down: Duration,
    share_location: bool,
    notices: mpsc::UnboundedSender<AlertNotice>,
    state: Mutex<ControllerState>,
}

/// Owner of the alert pipeline
///
/// Must be created inside a tokio runtime.
pub struct AlertController {
    shared: Arc<Shared>,
    listener: JoinHandle<()>,
}

impl AlertController {
    pub fn new(config: &Config, services: AlertServices) -> (Self, AlertNotices) {
        let (recognition, updates) =
            RecognitionManager::new(services.engine, &config.recognition);
        let (notices, receiver) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            recognition,
            dispatcher: AlertDispatcher::new(services.provider),
            contacts: services.contacts,
            location: services.location,
            history: services.history,
            keywords: RwLock::new(KeywordSet::new(&config.keywords.keywords)),
            cool_down: config.alert.cool_down(),
            share_location: config.alert.share_location,
            notices,
            state: Mutex::new(ControllerState::default()),
        });

        let listener = tokio::spawn(Arc::clone(&shared).listen(updates));
        (Self { shared, listener }, receiver)
    }

    pub fn phase(&self) -> AlertPhase {
        self.shared.state.lock().machine.phase()
    }

    pub fn keywords(&self) -> KeywordSet {
        self.shared.keywords.read().clone()
    }

    /// Replace the keyword set; takes effect on the next transcript update
    pub fn set_keywords(&self, keywords: KeywordSet) {
        tracing::info!("Keywords updated ({} configured)", keywords.len());
        *self.shared.keywords.write() = keywords;
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let state = self.shared.state.lock();
        AlertSnapshot {
            phase: state.machine.phase(),
            is_listening: self.shared.recognition.is_listening(),
            transcript: self.shared.recognition.transcript(),
            cycle: state.cycle.clone(),
            alerts_triggered: state.machine.alerts_triggered(),
            error: state
                .error
                .clone()
                .or_else(|| self.shared.recognition.error()),
        }
    }

    /// Turn protection on. No-op when already on.
    pub fn activate(&self) -> Result<(), AuroraError> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.machine.phase() != AlertPhase::Idle {
            return Ok(());
        }

        state.error = None;
        if let Err(e) = shared.recognition.start() {
            state.error = Some(e.to_string());
            return Err(e);
        }

        if let Some(result) = state.machine.process_event(AlertEvent::Activate) {
            shared.notify(AlertNotice::PhaseChanged {
                phase: result.new_phase,
            });
        }
        drop(state);

        if shared.share_location {
            if let Some(location) = &shared.location {
                shared.track_location(location);
            }
        }
        Ok(())
    }

    /// Turn protection off. Cancels the cool-down and clears the alert cycle;
    /// an in-flight dispatch still runs to completion.
    pub fn deactivate(&self) {
        self.shared.deactivate();
    }
}

impl Drop for AlertController {
    fn drop(&mut self) {
        self.listener.abort();
        self.shared.deactivate();
    }
}

impl Shared {
    fn notify(&self, notice: AlertNotice) {
        if self.notices.send(notice).is_err() {
            tracing::trace!("Alert notice dropped, no receiver");
        }
    }

    async fn listen(self: Arc<Self>, mut updates: RecognitionUpdates) {
        while let Some(update) = updates.recv().await {
            match update {
                RecognitionUpdate::Transcript { text } => self.on_transcript(&text),
                RecognitionUpdate::Error { message, fatal } => {
                    self.notify(AlertNotice::RecognitionError {
                        message: message.clone(),
                        fatal,
                    });
                    if fatal {
                        self.state.lock().error = Some(message);
                        self.deactivate();
                    }
                }
                RecognitionUpdate::ListeningChanged { listening } => {
                    tracing::trace!("Recognition listening: {}", listening);
                }
            }
        }
    }

    fn track_location(&self, location: &Arc<LocationProvider>) {
        if let Err(e) = location.start_watching() {
            tracing::warn!("Location watch unavailable: {}", e);
        }
        let location = Arc::clone(location);
        tokio::spawn(async move {
            let _ = location.refresh().await;
        });
    }

    fn on_transcript(self: &Arc<Self>, transcript: &str) {
        let keyword = {
            let keywords = self.keywords.read();
            match match_keyword(transcript, &keywords) {
                Some(keyword) => keyword.to_string(),
                None => return,
            }
        };

        let mut state = self.state.lock();
        let Some(result) = state.machine.process_event(AlertEvent::KeywordMatched {
            keyword: keyword.clone(),
        }) else {
            tracing::debug!(
                "Keyword '{}' ignored in phase {:?}",
                keyword,
                state.machine.phase()
            );
            return;
        };

        tracing::info!("Keyword detected: '{}'", keyword);
        self.recognition.rearm();

        let contacts = self.contacts.snapshot();
        let location = if self.share_location {
            self.location
                .as_ref()
                .and_then(|l| l.latest())
                .map(|p| p.coords)
        } else {
            None
        };

        let mut cycle = AlertCycle::new(
            &keyword,
            transcript,
            location,
            contacts.as_deref().unwrap_or_default(),
        );
        state.cycle_id += 1;
        let cycle_id = state.cycle_id;

        if let Some(timer) = state.cool_down.take() {
            timer.abort();
        }
        let shared = Arc::clone(self);
        let cool_down = self.cool_down;
        state.cool_down = Some(tokio::spawn(async move {
            tokio::time::sleep(cool_down).await;
            shared.cool_down_elapsed(cycle_id);
        }));

        self.notify(AlertNotice::PhaseChanged {
            phase: result.new_phase,
        });
        self.notify(AlertNotice::KeywordDetected {
            keyword: keyword.clone(),
            transcript: transcript.to_string(),
        });

        let contacts = match contacts {
            Ok(contacts) if !contacts.is_empty() => contacts,
            Ok(_) => {
                tracing::warn!("Keyword detected but no emergency contacts are configured");
                state.cycle = Some(cycle);
                drop(state);
                self.notify(AlertNotice::NoContactsConfigured);
                self.record_undelivered(
                    &keyword,
                    transcript,
                    location,
                    DispatchOutcome::Skipped,
                    &AuroraError::NoContactsConfigured,
                );
                return;
            }
            Err(e) => {
                let error = AuroraError::from(e);
                tracing::error!("Alert raised but contacts are unavailable: {}", error);
                state.cycle = Some(cycle);
                drop(state);
                self.notify(AlertNotice::ContactsUnavailable {
                    message: error.to_string(),
                });
                self.record_undelivered(
                    &keyword,
                    transcript,
                    location,
                    DispatchOutcome::Failed,
                    &error,
                );
                return;
            }
        };

        cycle.mark_in_progress();
        state.cycle = Some(cycle);
        drop(state);

        let shared = Arc::clone(self);
        let transcript = transcript.to_string();
        tokio::spawn(async move {
            let outcome = shared
                .dispatcher
                .dispatch(&contacts, &keyword, location)
                .await;
            shared.finish_dispatch(
                cycle_id,
                &keyword,
                &transcript,
                location,
                contacts.len(),
                outcome,
            );
        });
    }

    fn finish_dispatch(
        &self,
        cycle_id: u64,
        keyword: &str,
        transcript: &str,
        location: Option<Coordinates>,
        contact_count: usize,
        outcome: Result<Vec<ContactOutcome>, DispatchError>,
    ) {
        {
            let mut state = self.state.lock();
            let current = state.cycle_id == cycle_id;
            match state.cycle.as_mut().filter(|_| current) {
                Some(cycle) => match &outcome {
                    Ok(results) => cycle.apply_results(results),
                    Err(_) => cycle.mark_failed(),
                },
                None => tracing::warn!(
                    "Dispatch for '{}' finished after its alert cycle ended; statuses not updated",
                    keyword
                ),
            }
        }

        let mut record = AlertRecord::new(
            keyword,
            transcript,
            location,
            contact_count,
            DispatchOutcome::Sent,
        );
        match outcome {
            Ok(results) => {
                let messages_sent = results
                    .iter()
                    .filter(|r| r.sms == SmsOutcome::Sent)
                    .count();
                self.notify(AlertNotice::AlertsSent {
                    messages_sent,
                    contacts: contact_count,
                });
                record.results = results;
            }
            Err(e) => {
                let error = AuroraError::from(e);
                tracing::error!("Alert dispatch failed: {}", error);
                self.notify(AlertNotice::DispatchFailed {
                    message: error.to_string(),
                });
                record.outcome = DispatchOutcome::Failed;
                record.error_message = Some(error.to_string());
            }
        }
        self.record(&record);
    }

    fn cool_down_elapsed(&self, cycle_id: u64) {
        let mut state = self.state.lock();
        if state.cycle_id != cycle_id {
            return;
        }
        state.cool_down = None;
        if let Some(result) = state.machine.process_event(AlertEvent::CoolDownElapsed) {
            state.cycle = None;
            // Speech heard while alerting must not start a new cycle
            self.recognition.rearm();
            drop(state);
            self.notify(AlertNotice::PhaseChanged {
                phase: result.new_phase,
            });
        }
    }

    fn deactivate(&self) {
        let mut state = self.state.lock();
        let Some(result) = state.machine.process_event(AlertEvent::Deactivate) else {
            return;
        };

        if let Some(timer) = state.cool_down.take() {
            timer.abort();
        }
        state.cycle = None;
        state.cycle_id += 1;
        self.recognition.stop();
        drop(state);

        if let Some(location) = &self.location {
            location.stop_watching();
        }
        self.notify(AlertNotice::PhaseChanged {
            phase: result.new_phase,
        });
    }

    /// History entry for a cycle that never reached the provider
    fn record_undelivered(
        &self,
        keyword: &str,
        transcript: &str,
        location: Option<Coordinates>,
        outcome: DispatchOutcome,
        error: &AuroraError,
    ) {
        let mut record = AlertRecord::new(keyword, transcript, location, 0, outcome);
        record.error_message = Some(error.to_string());
        self.record(&record);
    }

    fn record(&self, record: &AlertRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record_alert(record) {
                tracing::error!("Failed to record alert history: {}", e);
            }
        }
    }
}
