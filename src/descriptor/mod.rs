//! Resolved client descriptors.
//!
//! A [`ClientDescriptor`] is the fully resolved specification of one remote
//! API surface. It is produced by a declarative binding layer (outside this
//! crate), shared as `Arc<ClientDescriptor>` and never mutated afterwards.

pub mod intercept;
pub mod operation;
pub mod policy;

pub use intercept::{AttributeValue, InterceptMark};
pub use operation::{OperationDescriptor, ReturnKind, ReturnType};
pub use policy::{DegradeSpec, DegradeStrategy, RetryRule, RetrySpec};

use crate::component::ComponentType;
use crate::config::{LogLevel, LogStrategy};
use crate::convert::{CallAdapterFactory, ConverterFactory};
use crate::environment::Environment;
use crate::interceptors::{DefaultErrorDecoder, ErrorDecoder};
use crate::transport::TransportFactory;
use crate::{Error, ErrorContext, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Per-client timeouts in milliseconds. `None` means "use the global default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub connect_ms: Option<u64>,
    pub read_ms: Option<u64>,
    pub write_ms: Option<u64>,
    pub call_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClientDescriptor {
    /// Identity of the API surface; build results are cached under it.
    pub id: String,
    pub base_url: Option<String>,
    pub service_id: Option<String>,
    /// Path prefix appended to `http://{service_id}/`.
    pub path: String,
    pub pool_name: String,
    pub timeouts: ClientTimeouts,
    pub retry_on_connection_failure: bool,
    pub follow_redirects: bool,
    pub follow_ssl_redirects: bool,
    pub ping_interval_ms: u64,
    pub validate_eagerly: bool,
    pub enable_log: bool,
    pub log_level: LogLevel,
    pub log_strategy: LogStrategy,
    pub call_adapter_factories: Vec<ComponentType<dyn CallAdapterFactory>>,
    pub converter_factories: Vec<ComponentType<dyn ConverterFactory>>,
    /// Name of a component registered as `Arc<dyn Api>`.
    pub fallback: Option<String>,
    /// Name of a component registered as `Arc<dyn FallbackFactory<dyn Api>>`.
    pub fallback_factory: Option<String>,
    pub error_decoder: ComponentType<dyn ErrorDecoder>,
    pub intercepts: Vec<InterceptMark>,
    pub degrade: Option<DegradeSpec>,
    pub retry: Option<RetrySpec>,
    /// Client-specific transport; the context's factory is used when `None`.
    /// It still sits behind the full interceptor chain.
    pub transport_factory: Option<Arc<dyn TransportFactory>>,
    pub operations: Vec<Arc<OperationDescriptor>>,
}

impl ClientDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: None,
            service_id: None,
            path: String::new(),
            pool_name: "default".into(),
            timeouts: ClientTimeouts::default(),
            retry_on_connection_failure: true,
            follow_redirects: true,
            follow_ssl_redirects: true,
            ping_interval_ms: 0,
            validate_eagerly: false,
            enable_log: true,
            log_level: LogLevel::Unset,
            log_strategy: LogStrategy::Unset,
            call_adapter_factories: Vec::new(),
            converter_factories: Vec::new(),
            fallback: None,
            fallback_factory: None,
            error_decoder: ComponentType::<dyn ErrorDecoder>::of::<DefaultErrorDecoder>(),
            intercepts: Vec::new(),
            degrade: None,
            retry: None,
            transport_factory: None,
            operations: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    pub fn with_pool(mut self, pool_name: impl Into<String>) -> Self {
        self.pool_name = pool_name.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_log(mut self, enable: bool, level: LogLevel, strategy: LogStrategy) -> Self {
        self.enable_log = enable;
        self.log_level = level;
        self.log_strategy = strategy;
        self
    }

    pub fn with_validate_eagerly(mut self, enable: bool) -> Self {
        self.validate_eagerly = enable;
        self
    }

    pub fn with_redirects(mut self, follow: bool, follow_ssl: bool) -> Self {
        self.follow_redirects = follow;
        self.follow_ssl_redirects = follow_ssl;
        self
    }

    pub fn with_retry_on_connection_failure(mut self, enable: bool) -> Self {
        self.retry_on_connection_failure = enable;
        self
    }

    pub fn with_ping_interval_ms(mut self, ms: u64) -> Self {
        self.ping_interval_ms = ms;
        self
    }

    pub fn with_call_adapter_factory(mut self, ty: ComponentType<dyn CallAdapterFactory>) -> Self {
        self.call_adapter_factories.push(ty);
        self
    }

    pub fn with_converter_factory(mut self, ty: ComponentType<dyn ConverterFactory>) -> Self {
        self.converter_factories.push(ty);
        self
    }

    pub fn with_fallback(mut self, component: impl Into<String>) -> Self {
        self.fallback = Some(component.into());
        self
    }

    pub fn with_fallback_factory(mut self, component: impl Into<String>) -> Self {
        self.fallback_factory = Some(component.into());
        self
    }

    pub fn with_error_decoder(mut self, ty: ComponentType<dyn ErrorDecoder>) -> Self {
        self.error_decoder = ty;
        self
    }

    pub fn with_intercept(mut self, mark: InterceptMark) -> Self {
        self.intercepts.push(mark);
        self
    }

    pub fn with_degrade(mut self, spec: DegradeSpec) -> Self {
        self.degrade = Some(spec);
        self
    }

    pub fn with_retry(mut self, spec: RetrySpec) -> Self {
        self.retry = Some(spec);
        self
    }

    pub fn with_operation(mut self, operation: OperationDescriptor) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    pub fn operation(&self, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Operation override, else class level. Default/static operations never carry one.
    pub fn effective_degrade(&self, operation: &OperationDescriptor) -> Option<DegradeSpec> {
        if !operation.is_remote() {
            return None;
        }
        operation.degrade.or(self.degrade)
    }

    pub fn effective_retry<'a>(&'a self, operation: &'a OperationDescriptor) -> Option<&'a RetrySpec> {
        operation.retry.as_ref().or(self.retry.as_ref())
    }

    /// Structural checks that need no collaborators. Runs before anything is allocated.
    pub fn validate(&self) -> Result<()> {
        let ctx = || ErrorContext::new().with_source("descriptor_validator");
        if self.id.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "client descriptor id must not be empty",
                ctx().with_field_path("client.id"),
            ));
        }
        if !has_text(&self.base_url) && !has_text(&self.service_id) {
            return Err(Error::configuration_with_context(
                "base_url and service_id must be configured with one",
                ctx()
                    .with_field_path("client.base_url")
                    .with_details(format!("client={}", self.id)),
            ));
        }
        let mut seen = HashSet::new();
        for op in &self.operations {
            if !seen.insert(op.name.as_str()) {
                return Err(Error::configuration_with_context(
                    format!("duplicate operation '{}'", op.name),
                    ctx().with_field_path(format!("client.operations.{}", op.name)),
                ));
            }
        }
        Ok(())
    }

    /// Effective base URL, always ending in `/`.
    ///
    /// A configured base URL wins; otherwise `http://{service_id}/{path}/` is used
    /// and the service-discovery interceptor rewrites the host per request.
    pub fn convert_base_url(&self, env: &dyn Environment) -> Result<String> {
        let raw = match self.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(base) => base.trim().to_string(),
            None => {
                let service_id = self.service_id.as_deref().unwrap_or_default().trim();
                let joined = format!("{}/{}", service_id, self.path.trim_matches('/'));
                format!("http://{}", collapse_slashes(&joined))
            }
        };
        let mut resolved = env.resolve_required_placeholders(&raw)?;
        if !resolved.ends_with('/') {
            resolved.push('/');
        }
        Ok(resolved)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}
