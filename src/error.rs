use crate::resilience::BlockSignal;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and runtime failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Descriptor attribute or configuration key that caused the error (e.g., "client.base_url", "intercepts[0].include")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "client_builder", "interceptor_assembler")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for client construction and invocation.
///
/// Construction-time failures are always [`Error::Configuration`]; everything
/// else is raised while a call is in flight and is eligible for fallback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Circuit open for resource '{resource}': {signal}")]
    CircuitOpen {
        resource: String,
        #[source]
        signal: BlockSignal,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response: HTTP {status} for {method} {url}")]
    Status {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    #[error("Retry failed: {attempts} attempts made at interval {interval_ms}ms")]
    RetryExhausted {
        attempts: u32,
        interval_ms: u64,
        #[source]
        last: Box<Error>,
    },

    #[error("Optional dependency missing: {dependency}{}", format_context(.context))]
    DependencyMissing {
        dependency: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decoded error: {0}")]
    Decoded(Box<dyn std::error::Error + Send + Sync>),

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn dependency_missing(dependency: impl Into<String>, context: ErrorContext) -> Self {
        Error::DependencyMissing {
            dependency: dependency.into(),
            context,
        }
    }

    /// Wrap a domain error produced by a custom [`ErrorDecoder`](crate::interceptors::ErrorDecoder).
    pub fn decoded<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Decoded(Box::new(err))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Transport failures are the "I/O exception" class for retry rules.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// HTTP status carried by the error, if the remote answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::DependencyMissing { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_renders_context() {
        let err = Error::configuration_with_context(
            "base_url and service_id must be configured with one",
            ErrorContext::new()
                .with_field_path("client.base_url")
                .with_source("descriptor_validator"),
        );
        let text = err.to_string();
        assert!(text.starts_with("Configuration error: base_url"));
        assert!(text.contains("field: client.base_url"));
        assert!(text.contains("source: descriptor_validator"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_status_is_visible_through_retry_exhausted() {
        let err = Error::RetryExhausted {
            attempts: 3,
            interval_ms: 50,
            last: Box::new(Error::Status {
                status: 503,
                method: "GET".into(),
                url: "http://localhost/a".into(),
                body: String::new(),
            }),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.context().is_none());
    }
}
