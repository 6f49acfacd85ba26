//! Location provider
//!
//! Keeps the last known GPS fix for inclusion in alerts. A one-shot refresh
//! runs on startup and on demand; a watch keeps the fix current afterwards.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capability::Capability;
use crate::config::{FixedLocation, LocationConfig};

/// Latitude/longitude pair sent with alerts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl From<FixedLocation> for Coordinates {
    fn from(fixed: FixedLocation) -> Self {
        Self {
            lat: fixed.lat,
            lng: fixed.lng,
        }
    }
}

/// A position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coords: Coordinates,
    /// Accuracy radius in metres
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

/// Positioning errors, classified the same way for one-shot and watch requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied. Please enable location access.")]
    PermissionDenied,

    #[error("Location information unavailable.")]
    Unavailable,

    #[error("Location request timed out.")]
    Timeout,

    #[error("Geolocation is not supported: {0}")]
    Unsupported(String),
}

/// Request options for a position source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the source may return
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub fn one_shot(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }

    pub fn watch(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.watch_timeout_ms),
            maximum_age: Duration::from_millis(config.watch_maximum_age_ms),
        }
    }
}

/// Stream of watch updates; dropping the receiver ends the watch
pub type PositionWatch = mpsc::UnboundedReceiver<Result<Position, LocationError>>;

/// Platform positioning backend
pub trait PositionSource: Send + Sync {
    /// Report whether positioning is available at all
    fn probe(&self) -> Capability;

    /// Resolve the current position once
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'_, Result<Position, LocationError>>;

    /// Begin delivering position updates
    fn watch_position(&self, options: PositionOptions) -> Result<PositionWatch, LocationError>;
}

#[derive(Debug, Default)]
struct LocationState {
    position: Option<Position>,
    error: Option<LocationError>,
    loading: bool,
}

/// Last-known-position cache over a `PositionSource`
pub struct LocationProvider {
    source: Arc<dyn PositionSource>,
    capability: Capability,
    one_shot: PositionOptions,
    watch: PositionOptions,
    state: Arc<RwLock<LocationState>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl LocationProvider {
    pub fn new(source: Arc<dyn PositionSource>, config: &LocationConfig) -> Self {
        let capability = source.probe();
        if let Some(reason) = capability.reason() {
            tracing::warn!("Geolocation unavailable: {}", reason);
        }

        Self {
            source,
            capability,
            one_shot: PositionOptions::one_shot(config),
            watch: PositionOptions::watch(config),
            state: Arc::new(RwLock::new(LocationState::default())),
            watch_task: Mutex::new(None),
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Last known position, if any fix has been obtained
    pub fn latest(&self) -> Option<Position> {
        self.state.read().position
    }

    pub fn last_error(&self) -> Option<LocationError> {
        self.state.read().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn is_watching(&self) -> bool {
        self.watch_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Request a fresh one-shot fix, bounded by the configured timeout.
    ///
    /// On failure the previous fix is kept and the error is stored.
    pub async fn refresh(&self) -> Result<Position, LocationError> {
        if let Some(reason) = self.capability.reason() {
            let error = LocationError::Unsupported(reason.to_string());
            self.state.write().error = Some(error.clone());
            return Err(error);
        }

        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let result = match tokio::time::timeout(
            self.one_shot.timeout,
            self.source.current_position(self.one_shot),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        let mut state = self.state.write();
        state.loading = false;
        match &result {
            Ok(position) => {
                tracing::debug!(
                    "Location refreshed: {:.4}, {:.4} (±{:.0}m)",
                    position.coords.lat,
                    position.coords.lng,
                    position.accuracy
                );
                state.position = Some(*position);
            }
            Err(e) => {
                tracing::warn!("Location refresh failed: {}", e);
                state.error = Some(e.clone());
            }
        }
        result
    }

    /// Start continuous position updates. No-op if already watching.
    pub fn start_watching(&self) -> Result<(), LocationError> {
        if let Some(reason) = self.capability.reason() {
            return Err(LocationError::Unsupported(reason.to_string()));
        }

        let mut task = self.watch_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let mut updates = self.source.watch_position(self.watch)?;
        let state = Arc::clone(&self.state);
        *task = Some(tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                match update {
                    Ok(position) => state.write().position = Some(position),
                    // An earlier fix is still usable, so watch errors are not surfaced
                    Err(e) => tracing::debug!("Ignoring location watch error: {}", e),
                }
            }
            tracing::debug!("Location watch ended");
        }));

        tracing::info!("Location watch started");
        Ok(())
    }

    pub fn stop_watching(&self) {
        if let Some(task) = self.watch_task.lock().take() {
            task.abort();
            tracing::info!("Location watch stopped");
        }
    }
}

impl Drop for LocationProvider {
    fn drop(&mut self) {
        if let Some(task) = self.watch_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Position source serving a configured static fix
pub struct FixedPositionSource {
    coords: Option<Coordinates>,
}

impl FixedPositionSource {
    pub fn new(fixed: Option<FixedLocation>) -> Self {
        Self {
            coords: fixed.map(Coordinates::from),
        }
    }

    fn fix(&self) -> Result<Position, LocationError> {
        self.coords
            .map(|coords| Position {
                coords,
                accuracy: 0.0,
                timestamp: Utc::now(),
            })
            .ok_or(LocationError::Unavailable)
    }
}

impl PositionSource for FixedPositionSource {
    fn probe(&self) -> Capability {
        if self.coords.is_some() {
            Capability::Supported
        } else {
            Capability::unsupported("no fixed location configured")
        }
    }

    fn current_position(
        &self,
        _options: PositionOptions,
    ) -> BoxFuture<'_, Result<Position, LocationError>> {
        let fix = self.fix();
        Box::pin(async move { fix })
    }

    fn watch_position(&self, _options: PositionOptions) -> Result<PositionWatch, LocationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.fix());
        Ok(rx)
    }
}
