//! Keyword-triggered alerting
//!
//! Phase state machine, per-contact progress, the dispatch contract with the
//! notification provider, and the controller tying them to recognition.

pub mod controller;
pub mod dispatcher;
pub mod provider;
pub mod state;
pub mod status;

pub use controller::{AlertController, AlertNotice, AlertNotices, AlertServices, AlertSnapshot};
pub use dispatcher::{
    AlertDispatcher, AlertRecipient, AlertRequest, AlertResponse, CallOutcome, ContactOutcome,
    DispatchError, NotificationProvider, ProviderResult, SmsOutcome,
};
pub use provider::{HttpNotificationProvider, NotifyError};
pub use state::{AlertEvent, AlertPhase, AlertStateMachine, TransitionReason, TransitionResult};
pub use status::{AlertCycle, AlertStatus, ContactStatus};
