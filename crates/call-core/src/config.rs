//! Configuration for call provisioning and the call view
//!
//! # Examples
//!
//! ```rust
//! use clgvibe_call_core::config::{CallConfig, ExitTarget};
//! use std::time::Duration;
//!
//! let config = CallConfig::new("stream-api-key")
//!     .with_exit_target(ExitTarget::Back)
//!     .with_join_timeout(Duration::from_secs(15));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.call_kind.as_str(), "default");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CallError, CallResult};
use crate::types::CallKind;

/// Environment variable holding the call capability API key
pub const ENV_API_KEY: &str = "CLGVIBE_STREAM_API_KEY";
/// Environment variable overriding the call kind
pub const ENV_CALL_KIND: &str = "CLGVIBE_CALL_KIND";
/// Environment variable overriding the route navigated to after a call
pub const ENV_EXIT_ROUTE: &str = "CLGVIBE_EXIT_ROUTE";
/// Environment variable setting a join timeout in milliseconds
pub const ENV_JOIN_TIMEOUT_MS: &str = "CLGVIBE_JOIN_TIMEOUT_MS";

/// Where to go when a call ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTarget {
    /// Navigate to a fixed route
    Route(String),
    /// Go back to the referring page
    Back,
}

impl Default for ExitTarget {
    fn default() -> Self {
        ExitTarget::Route("/".to_string())
    }
}

/// Call provisioning and presentation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// API key for the hosted call capability
    pub api_key: String,
    /// Call type passed to get-or-create
    pub call_kind: CallKind,
    /// Create the call resource on join when it does not exist
    pub create_if_missing: bool,
    /// Navigation after the call ends
    pub exit_target: ExitTarget,
    /// Give up on a join after this many milliseconds; `None` waits forever
    pub join_timeout_ms: Option<u64>,
    /// Alert shown when provisioning fails
    pub join_failure_message: String,
    /// Body of the error view
    pub connection_error_message: String,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            call_kind: CallKind::default(),
            create_if_missing: true,
            exit_target: ExitTarget::default(),
            join_timeout_ms: None,
            join_failure_message: "Could not join the call. Please try again.".to_string(),
            connection_error_message: "Could not initialize call. Please refresh or try again later."
                .to_string(),
        }
    }
}

impl CallConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_call_kind(mut self, kind: impl Into<String>) -> Self {
        self.call_kind = CallKind::new(kind);
        self
    }

    pub fn with_exit_target(mut self, target: ExitTarget) -> Self {
        self.exit_target = target;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }

    /// Load from `CLGVIBE_*` environment variables on top of the defaults
    pub fn from_env() -> CallResult<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var(ENV_API_KEY) {
            config.api_key = key;
        }
        if let Ok(kind) = std::env::var(ENV_CALL_KIND) {
            config.call_kind = CallKind::new(kind);
        }
        if let Ok(route) = std::env::var(ENV_EXIT_ROUTE) {
            config.exit_target = ExitTarget::Route(route);
        }
        if let Ok(raw) = std::env::var(ENV_JOIN_TIMEOUT_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                CallError::configuration(ENV_JOIN_TIMEOUT_MS, format!("'{}' is not a number: {}", raw, e))
            })?;
            config.join_timeout_ms = Some(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> CallResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CallError::configuration("call_config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CallResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(CallError::configuration("api_key", "API key is required"));
        }

        if self.call_kind.as_str().trim().is_empty() {
            return Err(CallError::configuration("call_kind", "call kind must not be empty"));
        }

        if let ExitTarget::Route(route) = &self.exit_target {
            if !route.starts_with('/') {
                return Err(CallError::configuration(
                    "exit_target",
                    format!("route '{}' must start with '/'", route),
                ));
            }
        }

        if self.join_timeout_ms == Some(0) {
            return Err(CallError::configuration("join_timeout_ms", "timeout must be positive"));
        }

        Ok(())
    }
}
