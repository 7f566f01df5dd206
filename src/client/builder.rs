use crate::cache::CopyOnWriteMap;
use crate::client::core::BuiltClient;
use crate::context::RetrofitContext;
use crate::descriptor::ClientDescriptor;
use crate::interceptors::{
    ErrorDecoderInterceptor, Interceptor, InterceptorAssembler, InterceptorChain,
    ServiceDiscoveryInterceptor,
};
use crate::resilience::{DegradeInterceptor, DegradeRuleRegistrar};
use crate::transport::{EffectiveTimeouts, TransportSettings};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Builds and caches one [`BuiltClient`] per descriptor id.
///
/// The first build of an id runs under the cache's writer lock; later calls
/// return the cached instance without locking.
pub struct ClientBuilder {
    context: Arc<RetrofitContext>,
    clients: CopyOnWriteMap<String, Arc<BuiltClient>>,
    assembler: InterceptorAssembler,
    registrar: DegradeRuleRegistrar,
}

impl ClientBuilder {
    pub fn new(context: Arc<RetrofitContext>) -> Self {
        let assembler = InterceptorAssembler::new(
            Arc::clone(&context.environment),
            Arc::clone(&context.components),
        );
        let registrar = DegradeRuleRegistrar::new(
            context.config.degrade.enable,
            context.degrade_engine.clone(),
            Arc::clone(&context.resource_names),
            Arc::clone(&context.environment),
        );
        Self {
            context,
            clients: CopyOnWriteMap::new(),
            assembler,
            registrar,
        }
    }

    pub fn context(&self) -> &Arc<RetrofitContext> {
        &self.context
    }

    pub fn build(&self, descriptor: &Arc<ClientDescriptor>) -> Result<Arc<BuiltClient>> {
        if let Some(client) = self.clients.get(&descriptor.id) {
            return Ok(client);
        }
        descriptor.validate()?;
        self.clients
            .get_or_try_insert_with(&descriptor.id, || self.assemble(descriptor).map(Arc::new))
    }

    pub fn cached(&self, id: &str) -> Option<Arc<BuiltClient>> {
        self.clients.get(&id.to_string())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn assemble(&self, descriptor: &Arc<ClientDescriptor>) -> Result<BuiltClient> {
        let ctx = &self.context;
        let cfg = &ctx.config;

        let raw_base = descriptor.convert_base_url(ctx.environment.as_ref())?;
        let base_url = Url::parse(&raw_base).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url '{}': {}", raw_base, e),
                ErrorContext::new()
                    .with_field_path("client.base_url")
                    .with_details(format!("client={}", descriptor.id))
                    .with_source("client_builder"),
            )
        })?;

        let pool = ctx.pools.get(&descriptor.pool_name)?;
        let t = &descriptor.timeouts;
        let settings = TransportSettings {
            pool_name: descriptor.pool_name.clone(),
            pool,
            timeouts: EffectiveTimeouts {
                connect: EffectiveTimeouts::resolve(t.connect_ms, cfg.global_connect_timeout_ms),
                read: EffectiveTimeouts::resolve(t.read_ms, cfg.global_read_timeout_ms),
                write: EffectiveTimeouts::resolve(t.write_ms, cfg.global_write_timeout_ms),
                call: EffectiveTimeouts::resolve(t.call_ms, cfg.global_call_timeout_ms),
            },
            retry_on_connection_failure: descriptor.retry_on_connection_failure,
            follow_redirects: descriptor.follow_redirects,
            follow_ssl_redirects: descriptor.follow_ssl_redirects,
            ping_interval: (descriptor.ping_interval_ms > 0)
                .then(|| Duration::from_millis(descriptor.ping_interval_ms)),
        };

        let interceptors = self.interceptors(descriptor)?;

        let components = ctx.components.as_ref();
        let call_adapter_factories = ctx.factories.call_adapter_factories(
            &descriptor.call_adapter_factories,
            &ctx.global_call_adapter_factories,
            components,
        )?;
        let converter_factories = ctx.factories.converter_factories(
            &descriptor.converter_factories,
            &ctx.global_converter_factories,
            components,
        )?;

        let transport = descriptor
            .transport_factory
            .as_ref()
            .unwrap_or(&ctx.transport_factory)
            .create(&settings)?;
        let client = BuiltClient::new(
            Arc::clone(descriptor),
            base_url,
            settings,
            InterceptorChain::new(interceptors, transport),
            call_adapter_factories,
            converter_factories,
            cfg.disable_void_return_type,
        );
        if descriptor.validate_eagerly {
            client.bind_all()?;
        }

        self.registrar.register_rules(descriptor)?;

        info!(
            client = %descriptor.id,
            base_url = %client.base_url(),
            pool = %descriptor.pool_name,
            interceptors = ?client.interceptor_names(),
            "built client"
        );
        Ok(client)
    }

    fn interceptors(&self, descriptor: &ClientDescriptor) -> Result<Vec<Arc<dyn Interceptor>>> {
        let ctx = &self.context;
        let cfg = &ctx.config;
        let mut chain: Vec<Arc<dyn Interceptor>> = Vec::new();

        if cfg.degrade.enable {
            match &ctx.degrade_engine {
                Some(engine) => chain.push(Arc::new(DegradeInterceptor::new(
                    Arc::clone(engine),
                    Arc::clone(&ctx.resource_names),
                    Arc::clone(&ctx.environment),
                ))),
                None => {
                    let missing = Error::dependency_missing(
                        "degrade engine",
                        ErrorContext::new()
                            .with_details(format!("client={}", descriptor.id))
                            .with_source("client_builder"),
                    );
                    warn!(client = %descriptor.id, error = %missing, "circuit breaking disabled for client");
                }
            }
        }

        if let Some(service_id) = configured_service(descriptor) {
            match &ctx.service_chooser {
                Some(chooser) => chain.push(Arc::new(ServiceDiscoveryInterceptor::new(
                    service_id,
                    Arc::clone(chooser),
                ))),
                None => {
                    let missing = Error::dependency_missing(
                        "service instance chooser",
                        ErrorContext::new()
                            .with_field_path("client.service_id")
                            .with_details(format!("client={} service_id={}", descriptor.id, service_id))
                            .with_source("client_builder"),
                    );
                    warn!(client = %descriptor.id, error = %missing, "service discovery disabled for client");
                }
            }
        }

        let decoder = descriptor.error_decoder.resolve(ctx.components.as_ref());
        chain.push(Arc::new(ErrorDecoderInterceptor::new(decoder)));

        for marked in self.assembler.resolve(descriptor)? {
            chain.push(Arc::new(marked));
        }
        chain.extend(ctx.global_interceptors.iter().cloned());
        chain.push(Arc::clone(&ctx.retry_interceptor));

        if cfg.log.enable && descriptor.enable_log {
            let level = descriptor.log_level.resolve(cfg.log.global_log_level)?;
            let strategy = descriptor
                .log_strategy
                .resolve(cfg.log.global_log_strategy)?;
            chain.push(ctx.logging.create(level, strategy));
        }
        chain.extend(ctx.network_interceptors.iter().cloned());

        Ok(chain)
    }
}

/// Service id to discover. A static base url does not suppress discovery.
fn configured_service(descriptor: &ClientDescriptor) -> Option<&str> {
    descriptor
        .service_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MapEnvironment;

    #[test]
    fn test_service_id_is_honoured_next_to_base_url() {
        let both = ClientDescriptor::new("a")
            .with_base_url("http://static/")
            .with_service_id("svc");
        assert_eq!(configured_service(&both), Some("svc"));

        let only_id = ClientDescriptor::new("b").with_service_id(" svc ");
        assert_eq!(configured_service(&only_id), Some("svc"));

        let blank = ClientDescriptor::new("c")
            .with_base_url("http://static/")
            .with_service_id("  ");
        assert_eq!(configured_service(&blank), None);
    }

    #[test]
    fn test_service_id_without_chooser_skips_discovery() {
        let ctx = RetrofitContext::builder()
            .environment(Arc::new(MapEnvironment::new()))
            .build()
            .unwrap();
        let builder = ClientBuilder::new(ctx);
        let d = Arc::new(ClientDescriptor::new("orders").with_service_id("order-service"));
        let client = builder.build(&d).unwrap();
        assert!(!client.interceptor_names().iter().any(|n| n == "service_discovery"));
        assert_eq!(client.base_url().as_str(), "http://order-service/");
    }
}
