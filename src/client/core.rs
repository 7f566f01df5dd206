use crate::cache::CopyOnWriteMap;
use crate::client::call::OperationCall;
use crate::convert::{CallAdapter, CallAdapterFactory, ConverterFactory, ResponseConverter};
use crate::descriptor::{ClientDescriptor, OperationDescriptor, ReturnKind};
use crate::interceptors::InterceptorChain;
use crate::transport::{Invocation, Request, Response, TransportSettings};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use url::Url;

/// A fully configured client for one descriptor.
///
/// Owned by the [`ClientBuilder`](crate::ClientBuilder) cache and shared by
/// every proxy of the same descriptor. Read-only after construction except
/// for the lazily filled operation bindings.
pub struct BuiltClient {
    descriptor: Arc<ClientDescriptor>,
    base_url: Url,
    settings: TransportSettings,
    chain: InterceptorChain,
    call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
    converter_factories: Vec<Arc<dyn ConverterFactory>>,
    disable_void_return_type: bool,
    bindings: CopyOnWriteMap<String, Arc<OperationBinding>>,
}

/// Per-operation call adapter and converter, chosen once.
pub struct OperationBinding {
    pub(crate) invocation: Arc<Invocation>,
    pub(crate) call_adapter: Arc<dyn CallAdapter>,
    pub(crate) converter: Arc<dyn ResponseConverter>,
    call_adapter_factory: String,
    converter_factory: String,
}

impl OperationBinding {
    pub fn operation(&self) -> &Arc<OperationDescriptor> {
        &self.invocation.operation
    }

    pub fn call_adapter_factory(&self) -> &str {
        &self.call_adapter_factory
    }

    pub fn converter_factory(&self) -> &str {
        &self.converter_factory
    }
}

/// Point-in-time view of a built client.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub id: String,
    pub base_url: String,
    pub pool: String,
    pub interceptors: Vec<String>,
    pub call_adapter_factories: Vec<String>,
    pub converter_factories: Vec<String>,
    pub bound_operations: usize,
}

impl BuiltClient {
    pub(crate) fn new(
        descriptor: Arc<ClientDescriptor>,
        base_url: Url,
        settings: TransportSettings,
        chain: InterceptorChain,
        call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
        converter_factories: Vec<Arc<dyn ConverterFactory>>,
        disable_void_return_type: bool,
    ) -> Self {
        Self {
            descriptor,
            base_url,
            settings,
            chain,
            call_adapter_factories,
            converter_factories,
            disable_void_return_type,
            bindings: CopyOnWriteMap::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<ClientDescriptor> {
        &self.descriptor
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Assembled interceptor order, outermost first.
    pub fn interceptor_names(&self) -> Vec<String> {
        self.chain.names()
    }

    pub fn call_adapter_factories(&self) -> &[Arc<dyn CallAdapterFactory>] {
        &self.call_adapter_factories
    }

    pub fn converter_factories(&self) -> &[Arc<dyn ConverterFactory>] {
        &self.converter_factories
    }

    /// Start a call to the named operation.
    pub fn call(&self, operation: &str) -> OperationCall<'_> {
        OperationCall::new(self, operation)
    }

    /// Run a request through the interceptor chain.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.chain.execute(request).await
    }

    pub fn binding(&self, operation: &str) -> Result<Arc<OperationBinding>> {
        self.bindings
            .get_or_try_insert_with(&operation.to_string(), || self.bind(operation).map(Arc::new))
    }

    /// Bind every remote operation now.
    pub(crate) fn bind_all(&self) -> Result<()> {
        for op in self.descriptor.operations.iter().filter(|op| op.is_remote()) {
            self.binding(&op.name)?;
        }
        Ok(())
    }

    fn bind(&self, name: &str) -> Result<OperationBinding> {
        let err = |message: String| {
            Error::configuration_with_context(
                message,
                ErrorContext::new()
                    .with_field_path(format!("{}.{}", self.descriptor.id, name))
                    .with_source("client_binding"),
            )
        };

        let operation = self
            .descriptor
            .operation(name)
            .ok_or_else(|| err(format!("client '{}' has no operation '{}'", self.descriptor.id, name)))?;
        if !operation.is_remote() {
            return Err(err(format!("operation '{}' is not a remote call", name)));
        }
        let return_type = &operation.return_type;
        if self.disable_void_return_type && return_type.kind == ReturnKind::Unit {
            return Err(err(format!(
                "operation '{}' returns nothing but void return types are disabled",
                name
            )));
        }

        let (call_adapter_factory, call_adapter) = self
            .call_adapter_factories
            .iter()
            .find_map(|f| f.get(return_type).map(|a| (f.name().to_string(), a)))
            .ok_or_else(|| {
                err(format!(
                    "no call adapter for {:?}<{}>",
                    return_type.kind, return_type.body_type
                ))
            })?;
        let (converter_factory, converter) = self
            .converter_factories
            .iter()
            .find_map(|f| f.response_converter(return_type).map(|c| (f.name().to_string(), c)))
            .ok_or_else(|| err(format!("no converter for body type '{}'", return_type.body_type)))?;

        Ok(OperationBinding {
            invocation: Arc::new(Invocation {
                descriptor: Arc::clone(&self.descriptor),
                operation: Arc::clone(operation),
            }),
            call_adapter,
            converter,
            call_adapter_factory,
            converter_factory,
        })
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            id: self.descriptor.id.clone(),
            base_url: self.base_url.to_string(),
            pool: self.settings.pool_name.clone(),
            interceptors: self.interceptor_names(),
            call_adapter_factories: self
                .call_adapter_factories
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            converter_factories: self
                .converter_factories
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            bound_operations: self.bindings.len(),
        }
    }
}

impl std::fmt::Debug for BuiltClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltClient")
            .field("id", &self.descriptor.id)
            .field("base_url", &self.base_url.as_str())
            .field("chain", &self.chain)
            .finish()
    }
}
