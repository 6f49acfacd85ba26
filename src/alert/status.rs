//! Per-contact alert progress for one alert cycle

use serde::{Deserialize, Serialize};

use super::dispatcher::{CallOutcome, ContactOutcome, SmsOutcome};
use crate::database::Contact;
use crate::location::Coordinates;

/// Progress flags for one contact.
///
/// `calling` and `called` are never both set; neither are `messaging` and
/// `message_sent`. Only the primary contact is ever calling or called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    pub calling: bool,
    pub called: bool,
    pub messaging: bool,
    pub message_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStatus {
    pub contact_id: String,
    pub name: String,
    pub is_primary: bool,
    pub status: AlertStatus,
}

/// State of one alert cycle, from keyword match until cool-down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCycle {
    pub keyword: String,
    /// Transcript text the keyword was found in
    pub transcript: String,
    pub location: Option<Coordinates>,
    /// Contacts in priority order, as snapshotted at the match
    pub contacts: Vec<ContactStatus>,
}

impl AlertCycle {
    /// Start a cycle with every contact's status all-false
    pub fn new(
        keyword: impl Into<String>,
        transcript: impl Into<String>,
        location: Option<Coordinates>,
        contacts: &[Contact],
    ) -> Self {
        Self {
            keyword: keyword.into(),
            transcript: transcript.into(),
            location,
            contacts: contacts
                .iter()
                .enumerate()
                .map(|(index, contact)| ContactStatus {
                    contact_id: contact.id.clone(),
                    name: contact.name.clone(),
                    is_primary: index == 0,
                    status: AlertStatus::default(),
                })
                .collect(),
        }
    }

    pub fn status(&self, contact_id: &str) -> Option<AlertStatus> {
        self.contacts
            .iter()
            .find(|c| c.contact_id == contact_id)
            .map(|c| c.status)
    }

    /// Dispatch started: everyone is being messaged, the primary is being called
    pub fn mark_in_progress(&mut self) {
        for contact in &mut self.contacts {
            contact.status = AlertStatus {
                calling: contact.is_primary,
                called: false,
                messaging: true,
                message_sent: false,
            };
        }
    }

    /// Dispatch completed with per-contact results
    pub fn apply_results(&mut self, outcomes: &[ContactOutcome]) {
        for contact in &mut self.contacts {
            let outcome = outcomes.iter().find(|o| o.contact_id == contact.contact_id);
            contact.status = AlertStatus {
                calling: false,
                called: contact.is_primary
                    && outcome.is_some_and(|o| o.call == CallOutcome::Initiated),
                messaging: false,
                message_sent: outcome.is_some_and(|o| o.sms == SmsOutcome::Sent),
            };
        }
    }

    /// Dispatch failed as a whole: nothing is reported as completed
    pub fn mark_failed(&mut self) {
        for contact in &mut self.contacts {
            contact.status = AlertStatus::default();
        }
    }

    pub fn messages_sent(&self) -> usize {
        self.contacts
            .iter()
            .filter(|c| c.status.message_sent)
            .count()
    }
}
