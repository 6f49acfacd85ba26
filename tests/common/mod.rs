//! Fakes shared by the integration tests.

#![allow(dead_code)]

use aurora_lib::alert::{
    AlertController, AlertNotice, AlertNotices, AlertRequest, AlertResponse, AlertServices,
    NotificationProvider, NotifyError, ProviderResult,
};
use aurora_lib::capability::Capability;
use aurora_lib::config::Config;
use aurora_lib::database::{Contact, ContactSource, Database, DatabaseError};
use aurora_lib::speech::{
    RecognitionError, RecognitionSession, SessionEvent, SessionEventSender, SessionOptions,
    SpeechEngine, SpeechError, TranscriptSegment,
};
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// =============================================================================
// Speech engine
// =============================================================================

/// Speech engine driven by the test through `say`/`emit`.
#[derive(Default)]
pub struct ScriptedEngine {
    pub unsupported: bool,
    pub created: AtomicUsize,
    pub senders: Mutex<Vec<SessionEventSender>>,
}

struct ScriptedSession {
    events: SessionEventSender,
}

impl RecognitionSession for ScriptedSession {
    fn start(&mut self) -> Result<(), SpeechError> {
        let _ = self.events.send(SessionEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        let _ = self.events.send(SessionEvent::Ended);
    }
}

impl SpeechEngine for ScriptedEngine {
    fn probe(&self) -> Capability {
        if self.unsupported {
            Capability::unsupported("speech recognition not available")
        } else {
            Capability::Supported
        }
    }

    fn create_session(
        &self,
        _options: &SessionOptions,
        events: SessionEventSender,
    ) -> Result<Box<dyn RecognitionSession>, SpeechError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.senders.lock().push(events.clone());
        Ok(Box::new(ScriptedSession { events }))
    }
}

impl ScriptedEngine {
    pub fn emit(&self, event: SessionEvent) {
        if let Some(sender) = self.senders.lock().last() {
            let _ = sender.send(event);
        }
    }

    /// Deliver a final transcript segment
    pub fn say(&self, index: u32, text: &str) {
        self.emit(SessionEvent::Transcript(TranscriptSegment::final_result(
            index, text,
        )));
    }

    pub fn fail(&self, error: RecognitionError) {
        self.emit(SessionEvent::Error(error));
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Notification provider
// =============================================================================

pub enum ProviderBehaviour {
    /// Mark these contact ids as SMS sent; the primary's call is initiated
    /// when `call_initiated` is set
    Deliver {
        sms_sent: Vec<String>,
        call_initiated: bool,
    },
    /// Fail the whole request
    Fail,
}

/// Provider that records requests and can be held until released.
pub struct FakeProvider {
    behaviour: Mutex<ProviderBehaviour>,
    requests: Mutex<Vec<AlertRequest>>,
    gated: bool,
    gate: Notify,
}

impl FakeProvider {
    pub fn new(behaviour: ProviderBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            requests: Mutex::new(Vec::new()),
            gated: false,
            gate: Notify::new(),
        })
    }

    /// Requests wait for `release` before answering
    pub fn gated(behaviour: ProviderBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            requests: Mutex::new(Vec::new()),
            gated: true,
            gate: Notify::new(),
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<AlertRequest> {
        self.requests.lock().clone()
    }

    fn respond(&self, request: &AlertRequest) -> Result<AlertResponse, NotifyError> {
        match &*self.behaviour.lock() {
            ProviderBehaviour::Fail => Err(NotifyError::ConnectionFailed(
                "network unreachable".to_string(),
            )),
            ProviderBehaviour::Deliver {
                sms_sent,
                call_initiated,
            } => Ok(AlertResponse {
                success: true,
                results: request
                    .contacts
                    .iter()
                    .map(|c| ProviderResult {
                        contact_id: c.id.clone(),
                        contact_name: Some(c.name.clone()),
                        sms_status: if sms_sent.contains(&c.id) {
                            "sent".to_string()
                        } else {
                            "failed".to_string()
                        },
                        call_status: c.is_primary.then(|| {
                            if *call_initiated { "initiated" } else { "failed" }.to_string()
                        }),
                        error: None,
                    })
                    .collect(),
                message: None,
                error: None,
            }),
        }
    }
}

impl NotificationProvider for FakeProvider {
    fn send_alert(
        &self,
        request: AlertRequest,
    ) -> BoxFuture<'_, Result<AlertResponse, NotifyError>> {
        self.requests.lock().push(request.clone());
        Box::pin(async move {
            if self.gated {
                self.gate.notified().await;
            }
            self.respond(&request)
        })
    }
}

// =============================================================================
// Contact store
// =============================================================================

/// Contact source whose reads fail as if the database were locked
pub struct LockedContacts;

impl ContactSource for LockedContacts {
    fn snapshot(&self) -> Result<Vec<Contact>, DatabaseError> {
        Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )))
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub controller: AlertController,
    pub notices: AlertNotices,
    pub engine: Arc<ScriptedEngine>,
    pub provider: Arc<FakeProvider>,
    pub contacts: Arc<RwLock<Vec<Contact>>>,
    pub history: Arc<Database>,
}

pub fn contacts(names: &[&str]) -> Vec<Contact> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Contact::new(*name, format!("+61 400 000 00{}", i), i as i64))
        .collect()
}

pub fn config(cool_down_secs: u64) -> Config {
    let mut config = Config::default();
    config.alert.cool_down_secs = cool_down_secs;
    config
}

impl Harness {
    pub fn new(config: &Config, contacts: Vec<Contact>, provider: Arc<FakeProvider>) -> Self {
        Self::with_engine(config, contacts, provider, Arc::new(ScriptedEngine::default()))
    }

    pub fn with_engine(
        config: &Config,
        contacts: Vec<Contact>,
        provider: Arc<FakeProvider>,
        engine: Arc<ScriptedEngine>,
    ) -> Self {
        let contacts = Arc::new(RwLock::new(contacts));
        Self::assemble(config, contacts.clone(), contacts, provider, engine)
    }

    /// Harness whose contact reads go through `source` instead of the
    /// in-memory list
    pub fn with_contact_source(
        config: &Config,
        source: Arc<dyn ContactSource>,
        provider: Arc<FakeProvider>,
    ) -> Self {
        let unused = Arc::new(RwLock::new(Vec::new()));
        let engine = Arc::new(ScriptedEngine::default());
        Self::assemble(config, source, unused, provider, engine)
    }

    fn assemble(
        config: &Config,
        source: Arc<dyn ContactSource>,
        contacts: Arc<RwLock<Vec<Contact>>>,
        provider: Arc<FakeProvider>,
        engine: Arc<ScriptedEngine>,
    ) -> Self {
        let history = Arc::new(Database::open_in_memory().expect("in-memory database"));
        let (controller, notices) = AlertController::new(
            config,
            AlertServices {
                engine: engine.clone(),
                provider: provider.clone(),
                contacts: source,
                location: None,
                history: Some(history.clone()),
            },
        );
        Self {
            controller,
            notices,
            engine,
            provider,
            contacts,
            history,
        }
    }

    /// Activate and wait for the session to report it is listening
    pub async fn activate(&mut self) {
        self.controller.activate().expect("activate");
        settle().await;
        self.drain();
    }

    pub fn drain(&mut self) -> Vec<AlertNotice> {
        let mut drained = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            drained.push(notice);
        }
        drained
    }
}

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}
