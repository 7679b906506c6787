//! Error taxonomy for the connection-management core.
//!
//! Adapter callback errors never escape the service boundary as panics;
//! every failure path maps to one of these kinds and is either returned
//! to the caller or forwarded outward as an event.

use thiserror::Error;

/// Failure reported by the platform radio backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The radio stack is not available (powered off, no permission).
    #[error("adapter unavailable")]
    Unavailable,
    /// The backend rejected or failed the requested operation.
    #[error("adapter backend error: {0}")]
    Backend(String),
}

/// Phase of endpoint enumeration that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationPhase {
    Services,
    Characteristics,
}

impl std::fmt::Display for EnumerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Services => write!(f, "services"),
            Self::Characteristics => write!(f, "characteristics"),
        }
    }
}

/// Core error kinds surfaced to the caller or forwarded as events.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VarioError {
    /// Connect requested against a device id no longer in the registry.
    #[error("invalid connect target: {0}")]
    InvalidTarget(String),

    /// Service or characteristic enumeration failed; the session is frozen
    /// in its current sub-state until an explicit disconnect + reconnect.
    #[error("{phase} enumeration failed: {reason}")]
    EnumerationFailed {
        phase: EnumerationPhase,
        reason: String,
    },

    /// A command was issued without an Active session and a known
    /// buzzer-control endpoint.
    #[error("no command endpoint available")]
    NoCommandEndpoint,

    /// An acknowledged write was rejected or failed to complete.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Immediate failure from the radio backend.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
