//! Platform capability negotiation
//!
//! Speech and positioning backends are probed once when their wrapper is
//! built; the rest of the pipeline consumes the typed result instead of
//! re-checking the platform.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Capability {
    Supported,
    Unsupported { reason: String },
}

impl Capability {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Capability::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported)
    }

    /// Why the capability is missing, if it is
    pub fn reason(&self) -> Option<&str> {
        match self {
            Capability::Supported => None,
            Capability::Unsupported { reason } => Some(reason),
        }
    }
}
