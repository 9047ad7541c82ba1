use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, Span};

/// Context information for logging
///
/// Call and social components open one of these per operation so that every
/// event they emit carries the component name, the operation and a few
/// identifying fields (call id, user id).
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component that is generating the log
    pub component: String,
    /// Operation or action being performed
    pub operation: Option<String>,
    /// Additional contextual fields, ordered for stable output
    pub fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context with just the component name
    pub fn new<S: Into<String>>(component: S) -> Self {
        LogContext {
            component: component.into(),
            operation: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create a new log context with component and operation
    pub fn with_operation<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        LogContext {
            component: component.into(),
            operation: Some(operation.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field<S: Into<String>, T: Into<String>>(mut self, key: S, value: T) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Create a span carrying this context's information
    pub fn span(&self, level: Level) -> Span {
        let operation = self.operation.as_deref().unwrap_or("-");
        let fields = self.fields_summary();
        // Span macros need a constant level
        match level {
            Level::TRACE => tracing::trace_span!("clgvibe", component = %self.component, operation, fields = %fields),
            Level::DEBUG => tracing::debug_span!("clgvibe", component = %self.component, operation, fields = %fields),
            Level::INFO => tracing::info_span!("clgvibe", component = %self.component, operation, fields = %fields),
            Level::WARN => tracing::warn_span!("clgvibe", component = %self.component, operation, fields = %fields),
            _ => tracing::error_span!("clgvibe", component = %self.component, operation, fields = %fields),
        }
    }

    fn fields_summary(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.component)?;

        if let Some(op) = &self.operation {
            write!(f, "[{}]", op)?;
        }

        for (key, value) in &self.fields {
            write!(f, "[{}={}]", key, value)?;
        }

        Ok(())
    }
}

/// Enter a logging context for the duration of a closure
pub fn with_context<F, R>(context: &LogContext, level: Level, f: F) -> R
where
    F: FnOnce() -> R,
{
    let span = context.span(level);
    let _guard = span.enter();
    f()
}
