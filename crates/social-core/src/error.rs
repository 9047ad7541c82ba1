//! Error types for the social data layer

use thiserror::Error;

/// Result type for social-core operations
pub type SocialResult<T> = Result<T, SocialError>;

/// Errors from the REST backend, the query cache or the preference store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocialError {
    /// A backend call failed
    #[error("{operation} failed: {reason}")]
    Api { operation: String, reason: String },

    /// The backend answered but the referenced record does not exist
    #[error("{what} not found")]
    NotFound { what: String },

    /// The user is not signed in or the session expired
    #[error("Not authenticated: {reason}")]
    Unauthorized { reason: String },

    /// A preference could not be read or written
    #[error("Preference '{key}' unavailable: {reason}")]
    Preference { key: String, reason: String },

    /// Persisted data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bad configuration value
    #[error("Invalid configuration for {field}: {reason}")]
    Configuration { field: String, reason: String },
}

impl SocialError {
    /// Create a backend error
    pub fn api(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a preference store error
    pub fn preference(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Preference {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            SocialError::Api { .. } | SocialError::Preference { .. } => true,
            SocialError::NotFound { .. }
            | SocialError::Unauthorized { .. }
            | SocialError::Serialization(_)
            | SocialError::Configuration { .. } => false,
        }
    }

    /// Error category used as a structured log field
    pub fn category(&self) -> &'static str {
        match self {
            SocialError::Api { .. } | SocialError::NotFound { .. } => "api",
            SocialError::Unauthorized { .. } => "auth",
            SocialError::Preference { .. } | SocialError::Serialization(_) => "preferences",
            SocialError::Configuration { .. } => "configuration",
        }
    }
}

impl From<serde_json::Error> for SocialError {
    fn from(err: serde_json::Error) -> Self {
        SocialError::Serialization(err.to_string())
    }
}
