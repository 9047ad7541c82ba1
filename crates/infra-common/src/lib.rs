//! Common infrastructure for the ClgVibe crates.
//!
//! Two concerns live here so that the call and social crates log and
//! report errors the same way:
//!
//! - [`logging`] - subscriber setup and component/operation log contexts
//! - [`errors`] - the infrastructure error type and error context

pub mod errors;
pub mod logging;

pub use errors::{ErrorContext, InfraError, InfraResult};
pub use logging::context::LogContext;
pub use logging::setup::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
