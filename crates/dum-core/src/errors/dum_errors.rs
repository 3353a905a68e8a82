//! Dialog usage manager errors
//!
//! Every variant except [`DumError::Transport`] and
//! [`DumError::Configuration`] describes a condition the dispatcher expects to
//! meet during normal operation: a usage destroyed underneath an application
//! handle, a response for a call leg that is already gone, a malformed
//! request that cannot seed a dialog set.

use thiserror::Error;

use crate::dialog::{DialogId, DialogSetId};
use crate::usage::UsageHandle;

/// Result type for dialog usage manager operations
pub type DumResult<T> = Result<T, DumError>;

/// Errors raised by the dialog usage manager
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DumError {
    /// The handle no longer refers to a live usage
    #[error("Stale usage handle: {handle}")]
    StaleHandle { handle: UsageHandle },

    /// No dialog set is registered under this id
    #[error("Dialog set not found: {id}")]
    DialogSetNotFound { id: DialogSetId },

    /// The dialog set exists but holds no dialog with this id
    #[error("Dialog not found: {id}")]
    DialogNotFound { id: DialogId },

    /// The dialog set has no pending creator to build a client usage from
    #[error("No creator pending for dialog set {id}")]
    CreatorNotFound { id: DialogSetId },

    /// A dialog set with this id is already registered
    #[error("Dialog set already exists: {id}")]
    DialogSetExists { id: DialogSetId },

    /// A usage with this handle is already registered
    #[error("Usage handle already registered: {handle}")]
    UsageExists { handle: UsageHandle },

    /// A message is malformed for the requested operation
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The operation is not valid in the current dialog or usage state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The underlying SIP stack refused or failed an operation
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DumError {
    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the error reports a usage that has already been destroyed
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, DumError::StaleHandle { .. })
    }

    /// True for conditions the dispatcher handles as part of normal operation
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DumError::Transport { .. } | DumError::Configuration { .. }
        )
    }

    /// Message used as the reason phrase when the error is turned into a 400
    pub fn reason_phrase(&self) -> String {
        match self {
            DumError::Protocol { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for DumError {
    fn from(err: serde_json::Error) -> Self {
        DumError::config(format!("Invalid configuration document: {}", err))
    }
}

impl From<std::io::Error> for DumError {
    fn from(err: std::io::Error) -> Self {
        DumError::config(format!("Unable to read configuration: {}", err))
    }
}
