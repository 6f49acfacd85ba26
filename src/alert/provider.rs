//! HTTP notification provider
//!
//! Posts the batched alert to the configured send-alert endpoint. There is no
//! retry: the provider may already have sent some messages when a request
//! fails, and repeating it would duplicate them.

use futures_util::future::BoxFuture;
use std::time::Duration;

use super::dispatcher::{AlertRequest, AlertResponse, NotificationProvider};
use crate::config::NotificationConfig;

/// Error types for provider calls
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider rejected the alert: {0}")]
    Rejected(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

/// reqwest-backed provider
#[derive(Debug, Clone)]
pub struct HttpNotificationProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpNotificationProvider {
    /// Create a provider from the notification config section
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        Self::with_config(&config.endpoint, config.api_key.clone(), config.timeout_secs)
    }

    /// Create a provider with full configuration
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the send-alert function
    /// * `api_key` - Optional bearer token
    /// * `timeout_secs` - Request timeout in seconds
    pub fn with_config(
        endpoint: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        url::Url::parse(endpoint)
            .map_err(|e| NotifyError::InvalidConfig(format!("{endpoint}: {e}")))?;

        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            api_key,
            client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post_alert(&self, request: &AlertRequest) -> Result<AlertResponse, NotifyError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(self.timeout.as_secs())
            } else {
                NotifyError::ConnectionFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            // The send-alert function reports failures as {"success":false,"error":...}
            let message = serde_json::from_str::<AlertResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(NotifyError::ServerError { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| NotifyError::ParseError(e.to_string()))
    }
}

impl NotificationProvider for HttpNotificationProvider {
    fn send_alert(
        &self,
        request: AlertRequest,
    ) -> BoxFuture<'_, Result<AlertResponse, NotifyError>> {
        Box::pin(async move {
            tracing::debug!(
                "Sending alert request to {} ({} contacts)",
                self.endpoint,
                request.contacts.len()
            );
            let result = self.post_alert(&request).await;
            if let Err(e) = &result {
                tracing::error!("Alert request failed: {}", e);
            }
            result
        })
    }
}
