//! Error types for call provisioning and lifecycle control

use thiserror::Error;

use crate::state::ConnectionState;
use crate::types::CallId;

/// Result type for call-core operations
pub type CallResult<T> = Result<T, CallError>;

/// Failures reported by the hosted call capability
///
/// The capability is opaque; these variants only classify what it tells us
/// so that callers can log and render a sensible message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Transport or connectivity failure
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// The access token was rejected
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The call resource could not be created or joined in its current state
    #[error("Call resource conflict: {reason}")]
    Conflict { reason: String },

    /// The operation did not complete in time
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Anything else the capability reported
    #[error("Call capability failure: {reason}")]
    Other { reason: String },
}

impl CapabilityError {
    /// Create a network error
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network { reason: reason.into() }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized { reason: reason.into() }
    }

    /// Create a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict { reason: reason.into() }
    }

    /// Create a generic capability error
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other { reason: reason.into() }
    }
}

/// Errors that can occur while provisioning or controlling a call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Identity, session token or call id has not resolved yet.
    ///
    /// Never shown to the user; provisioning is simply deferred.
    #[error("Identity, session token or call id not yet available")]
    IdentityUnavailable,

    /// Client construction or join failed
    #[error("Could not provision call {call_id}: {cause}")]
    Provision { call_id: CallId, cause: CapabilityError },

    /// The call reached `left` without a local leave request
    #[error("Call {call_id} was left without a local leave request")]
    UnexpectedDisconnect { call_id: CallId },

    /// Another join attempt is still pending
    #[error("A join attempt is already in flight")]
    JoinInFlight,

    /// Operation not valid in the current state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Rejected connection-state transition
    #[error("Invalid connection state transition from {from} to {to}")]
    InvalidTransition { from: ConnectionState, to: ConnectionState },

    /// Bad configuration value
    #[error("Invalid configuration for {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// The capability failed outside of provisioning (leave, disconnect)
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The session token could not be fetched
    #[error("Session token unavailable: {reason}")]
    Token { reason: String },

    /// The controller task has already finished
    #[error("Call controller is no longer running")]
    ControllerGone,
}

impl CallError {
    /// Create a provisioning error
    pub fn provision(call_id: CallId, cause: CapabilityError) -> Self {
        Self::Provision { call_id, cause }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a token error
    pub fn token(reason: impl Into<String>) -> Self {
        Self::Token { reason: reason.into() }
    }

    /// Whether a fresh attempt (a reload) could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            CallError::IdentityUnavailable | CallError::JoinInFlight | CallError::Token { .. } => true,
            CallError::Provision { cause, .. } | CallError::Capability(cause) => matches!(
                cause,
                CapabilityError::Network { .. } | CapabilityError::Timeout { .. }
            ),
            CallError::UnexpectedDisconnect { .. } => true,
            CallError::InvalidState { .. }
            | CallError::InvalidTransition { .. }
            | CallError::Configuration { .. }
            | CallError::ControllerGone => false,
        }
    }

    /// Error category used as a structured log field
    pub fn category(&self) -> &'static str {
        match self {
            CallError::IdentityUnavailable | CallError::Token { .. } => "identity",
            CallError::Provision { .. } | CallError::JoinInFlight => "provisioning",
            CallError::UnexpectedDisconnect { .. } | CallError::Capability(_) => "call",
            CallError::InvalidState { .. } | CallError::InvalidTransition { .. } => "state",
            CallError::Configuration { .. } => "configuration",
            CallError::ControllerGone => "controller",
        }
    }

    /// Whether this error should reach the user
    pub fn is_user_facing(&self) -> bool {
        matches!(self, CallError::Provision { .. })
    }
}
