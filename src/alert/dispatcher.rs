//! Alert dispatch
//!
//! One alert cycle produces exactly one provider call covering every
//! contact. The provider sends an SMS to each contact and places a single
//! voice call to the primary one; the dispatcher only deals in the
//! aggregated per-contact outcome.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::provider::NotifyError;
use crate::database::Contact;
use crate::location::Coordinates;

/// SMS result for one contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsOutcome {
    Sent,
    Failed,
}

/// Voice call result for one contact; only the primary contact is called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Initiated,
    Failed,
    NotApplicable,
}

/// Dispatch result for one contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactOutcome {
    pub contact_id: String,
    pub sms: SmsOutcome,
    pub call: CallOutcome,
}

/// A contact as sent to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecipient {
    pub id: String,
    pub name: String,
    /// Normalised phone number
    pub phone: String,
    pub is_primary: bool,
}

/// Body of the provider request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub contacts: Vec<AlertRecipient>,
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<Coordinates>,
}

/// Per-contact entry of the provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub contact_id: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    /// "sent" on success; anything else counts as failed
    pub sms_status: String,
    /// "initiated" on success; absent for contacts that are not called
    #[serde(default)]
    pub call_status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Provider response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<ProviderResult>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// External messaging provider
pub trait NotificationProvider: Send + Sync {
    /// Deliver one batched alert. Any transport or provider failure fails the
    /// whole batch.
    fn send_alert(
        &self,
        request: AlertRequest,
    ) -> BoxFuture<'_, Result<AlertResponse, NotifyError>>;
}

/// Errors from a dispatch attempt
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No emergency contacts configured")]
    NoContacts,

    #[error("Failed to send alerts: {0}")]
    Provider(#[from] NotifyError),
}

/// Builds provider requests and maps responses back to contacts
#[derive(Clone)]
pub struct AlertDispatcher {
    provider: Arc<dyn NotificationProvider>,
}

impl AlertDispatcher {
    pub fn new(provider: Arc<dyn NotificationProvider>) -> Self {
        Self { provider }
    }

    /// Send one alert to every contact.
    ///
    /// `contacts` must be in priority order; index 0 is the primary contact.
    /// The returned outcomes follow the same order.
    pub async fn dispatch(
        &self,
        contacts: &[Contact],
        keyword: &str,
        location: Option<Coordinates>,
    ) -> Result<Vec<ContactOutcome>, DispatchError> {
        if contacts.is_empty() {
            return Err(DispatchError::NoContacts);
        }

        let request = build_request(contacts, keyword, location);
        tracing::info!(
            "Dispatching alert for '{}' to {} contacts (location: {})",
            keyword,
            contacts.len(),
            location.is_some()
        );

        let response = self.provider.send_alert(request).await?;
        if !response.success {
            let message = response
                .error
                .or(response.message)
                .unwrap_or_else(|| "provider reported failure".to_string());
            return Err(NotifyError::Rejected(message).into());
        }

        for result in &response.results {
            if let Some(error) = &result.error {
                tracing::warn!(
                    "Provider error for contact {}: {}",
                    result.contact_id,
                    error.trim()
                );
            }
        }

        let outcomes = map_outcomes(contacts, &response.results);
        tracing::info!(
            "Alert dispatched: {}/{} messages sent",
            outcomes
                .iter()
                .filter(|o| o.sms == SmsOutcome::Sent)
                .count(),
            outcomes.len()
        );
        Ok(outcomes)
    }
}

fn build_request(
    contacts: &[Contact],
    keyword: &str,
    location: Option<Coordinates>,
) -> AlertRequest {
    AlertRequest {
        contacts: contacts
            .iter()
            .enumerate()
            .map(|(index, contact)| AlertRecipient {
                id: contact.id.clone(),
                name: contact.name.clone(),
                phone: contact.dial_number(),
                is_primary: index == 0,
            })
            .collect(),
        keyword: keyword.to_string(),
        location,
    }
}

/// Contacts missing from the response are treated as failed.
fn map_outcomes(contacts: &[Contact], results: &[ProviderResult]) -> Vec<ContactOutcome> {
    contacts
        .iter()
        .enumerate()
        .map(|(index, contact)| {
            let result = results.iter().find(|r| r.contact_id == contact.id);
            let sms = match result {
                Some(r) if r.sms_status == "sent" => SmsOutcome::Sent,
                _ => SmsOutcome::Failed,
            };
            let call = if index != 0 {
                CallOutcome::NotApplicable
            } else {
                match result.and_then(|r| r.call_status.as_deref()) {
                    Some("initiated") => CallOutcome::Initiated,
                    _ => CallOutcome::Failed,
                }
            };
            ContactOutcome {
                contact_id: contact.id.clone(),
                sms,
                call,
            }
        })
        .collect()
}
