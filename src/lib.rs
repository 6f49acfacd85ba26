//! Aurora - keyword-triggered personal safety alerts
//!
//! Listens to ambient speech, matches configured emergency keywords, and
//! fans an alert out to the user's emergency contacts with their location.

pub mod alert;
pub mod capability;
pub mod config;
pub mod database;
pub mod error;
pub mod keywords;
pub mod location;
pub mod logging;
pub mod speech;

pub use error::{AuroraError, Result};
