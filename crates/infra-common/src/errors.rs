//! Infrastructure error type and error context

use std::fmt;
use thiserror::Error;

/// Result type for infrastructure operations
pub type InfraResult<T> = Result<T, InfraError>;

/// Errors raised while setting up shared infrastructure
#[derive(Debug, Error)]
pub enum InfraError {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Error annotated with the component and operation it came from
    #[error("{message} [{context}]")]
    WithContext {
        /// Original error message
        message: String,
        /// Where it happened
        context: ErrorContext,
    },
}

impl InfraError {
    /// Attach `context` to this error
    pub fn in_context(self, context: ErrorContext) -> Self {
        InfraError::WithContext {
            message: self.to_string(),
            context,
        }
    }
}

/// Context information for an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    /// Add details to the context
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}
