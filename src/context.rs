//! Process-wide collaborators shared by every client build.

use crate::cache::FactoryCache;
use crate::component::{ComponentProvider, ComponentType, EmptyProvider};
use crate::config::RetrofitConfig;
use crate::convert::{
    BodyCallAdapterFactory, CallAdapterFactory, ConverterFactory, JsonConverterFactory,
    ResponseCallAdapterFactory, TextConverterFactory,
};
use crate::environment::{Environment, SystemEnvironment};
use crate::interceptors::{
    DefaultLoggingInterceptorFactory, Interceptor, LoggingInterceptorFactory, RetryInterceptor,
    ServiceInstanceChooser,
};
use crate::resilience::{CachedResourceNameResolver, DegradeEngine, ResourceNameResolver};
use crate::transport::{ConnectionPoolRegistry, ReqwestTransportFactory, TransportFactory};
use crate::Result;
use std::sync::Arc;

/// Everything a [`ClientBuilder`](crate::ClientBuilder) needs besides the descriptor.
///
/// Built once, shared as `Arc`, read-only afterwards.
pub struct RetrofitContext {
    pub(crate) config: RetrofitConfig,
    pub(crate) environment: Arc<dyn Environment>,
    pub(crate) components: Arc<dyn ComponentProvider>,
    pub(crate) pools: ConnectionPoolRegistry,
    pub(crate) factories: Arc<FactoryCache>,
    pub(crate) global_interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) network_interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) retry_interceptor: Arc<dyn Interceptor>,
    pub(crate) degrade_engine: Option<Arc<dyn DegradeEngine>>,
    pub(crate) service_chooser: Option<Arc<dyn ServiceInstanceChooser>>,
    pub(crate) resource_names: Arc<dyn ResourceNameResolver>,
    pub(crate) global_call_adapter_factories: Vec<ComponentType<dyn CallAdapterFactory>>,
    pub(crate) global_converter_factories: Vec<ComponentType<dyn ConverterFactory>>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,
    pub(crate) logging: Arc<dyn LoggingInterceptorFactory>,
}

impl RetrofitContext {
    pub fn builder() -> RetrofitContextBuilder {
        RetrofitContextBuilder::new()
    }

    pub fn config(&self) -> &RetrofitConfig {
        &self.config
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    pub fn components(&self) -> &Arc<dyn ComponentProvider> {
        &self.components
    }

    pub fn pools(&self) -> &ConnectionPoolRegistry {
        &self.pools
    }

    pub fn factories(&self) -> &Arc<FactoryCache> {
        &self.factories
    }

    pub fn resource_names(&self) -> &Arc<dyn ResourceNameResolver> {
        &self.resource_names
    }

    pub fn degrade_engine(&self) -> Option<&Arc<dyn DegradeEngine>> {
        self.degrade_engine.as_ref()
    }
}

/// Builder for [`RetrofitContext`]. Unset collaborators get defaults:
/// system environment, empty component provider, reqwest transport,
/// no breaker engine, no service chooser.
pub struct RetrofitContextBuilder {
    config: RetrofitConfig,
    environment: Arc<dyn Environment>,
    components: Arc<dyn ComponentProvider>,
    factories: Option<Arc<FactoryCache>>,
    global_interceptors: Vec<Arc<dyn Interceptor>>,
    network_interceptors: Vec<Arc<dyn Interceptor>>,
    retry_interceptor: Option<Arc<dyn Interceptor>>,
    degrade_engine: Option<Arc<dyn DegradeEngine>>,
    service_chooser: Option<Arc<dyn ServiceInstanceChooser>>,
    resource_names: Option<Arc<dyn ResourceNameResolver>>,
    global_call_adapter_factories: Vec<ComponentType<dyn CallAdapterFactory>>,
    global_converter_factories: Vec<ComponentType<dyn ConverterFactory>>,
    transport_factory: Arc<dyn TransportFactory>,
    logging: Arc<dyn LoggingInterceptorFactory>,
}

impl RetrofitContextBuilder {
    pub fn new() -> Self {
        Self {
            config: RetrofitConfig::default(),
            environment: Arc::new(SystemEnvironment),
            components: Arc::new(EmptyProvider),
            factories: None,
            global_interceptors: Vec::new(),
            network_interceptors: Vec::new(),
            retry_interceptor: None,
            degrade_engine: None,
            service_chooser: None,
            resource_names: None,
            global_call_adapter_factories: vec![
                ComponentType::<dyn CallAdapterFactory>::of::<BodyCallAdapterFactory>(),
                ComponentType::<dyn CallAdapterFactory>::of::<ResponseCallAdapterFactory>(),
            ],
            global_converter_factories: vec![
                ComponentType::<dyn ConverterFactory>::of::<TextConverterFactory>(),
                ComponentType::<dyn ConverterFactory>::of::<JsonConverterFactory>(),
            ],
            transport_factory: Arc::new(ReqwestTransportFactory),
            logging: Arc::new(DefaultLoggingInterceptorFactory),
        }
    }

    pub fn config(mut self, config: RetrofitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    /// External dependency lookup for factories, handlers, decoders and fallbacks.
    pub fn components(mut self, components: Arc<dyn ComponentProvider>) -> Self {
        self.components = components;
        self
    }

    /// Share one factory cache between several contexts.
    pub fn factory_cache(mut self, cache: Arc<FactoryCache>) -> Self {
        self.factories = Some(cache);
        self
    }

    /// Application interceptor applied to every client after its own marks.
    pub fn global_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.global_interceptors.push(interceptor);
        self
    }

    /// Interceptor placed after logging, closest to the transport.
    pub fn network_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.network_interceptors.push(interceptor);
        self
    }

    /// Replace the built-in [`RetryInterceptor`].
    pub fn retry_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.retry_interceptor = Some(interceptor);
        self
    }

    /// Circuit-breaker engine. Without one, enabling degrade only logs a warning.
    pub fn degrade_engine(mut self, engine: Arc<dyn DegradeEngine>) -> Self {
        self.degrade_engine = Some(engine);
        self
    }

    pub fn service_chooser(mut self, chooser: Arc<dyn ServiceInstanceChooser>) -> Self {
        self.service_chooser = Some(chooser);
        self
    }

    pub fn resource_name_resolver(mut self, resolver: Arc<dyn ResourceNameResolver>) -> Self {
        self.resource_names = Some(resolver);
        self
    }

    /// Replace the global call adapter list (appended after each client's own).
    pub fn global_call_adapter_factories(
        mut self,
        factories: Vec<ComponentType<dyn CallAdapterFactory>>,
    ) -> Self {
        self.global_call_adapter_factories = factories;
        self
    }

    pub fn global_converter_factories(
        mut self,
        factories: Vec<ComponentType<dyn ConverterFactory>>,
    ) -> Self {
        self.global_converter_factories = factories;
        self
    }

    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = factory;
        self
    }

    pub fn logging_interceptor_factory(mut self, factory: Arc<dyn LoggingInterceptorFactory>) -> Self {
        self.logging = factory;
        self
    }

    pub fn build(self) -> Result<Arc<RetrofitContext>> {
        let pools = ConnectionPoolRegistry::from_config(&self.config.pool)?;
        let retry_interceptor = self
            .retry_interceptor
            .unwrap_or_else(|| Arc::new(RetryInterceptor::new(self.config.retry.clone())));
        Ok(Arc::new(RetrofitContext {
            pools,
            factories: self.factories.unwrap_or_default(),
            retry_interceptor,
            resource_names: self
                .resource_names
                .unwrap_or_else(|| Arc::new(CachedResourceNameResolver::default())),
            config: self.config,
            environment: self.environment,
            components: self.components,
            global_interceptors: self.global_interceptors,
            network_interceptors: self.network_interceptors,
            degrade_engine: self.degrade_engine,
            service_chooser: self.service_chooser,
            global_call_adapter_factories: self.global_call_adapter_factories,
            global_converter_factories: self.global_converter_factories,
            transport_factory: self.transport_factory,
            logging: self.logging,
        }))
    }
}

impl Default for RetrofitContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
