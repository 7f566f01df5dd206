use super::{Interceptor, Next};
use crate::transport::{Request, Response};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Picks a concrete instance for a logical service id on every call.
#[async_trait]
pub trait ServiceInstanceChooser: Send + Sync {
    async fn choose(&self, service_id: &str) -> Result<Url>;
}

struct Instances {
    urls: Vec<Url>,
    cursor: AtomicUsize,
}

/// Fixed instance lists, chosen round-robin.
#[derive(Default)]
pub struct StaticServiceInstanceChooser {
    services: HashMap<String, Instances>,
}

impl StaticServiceInstanceChooser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(mut self, service_id: impl Into<String>, urls: Vec<Url>) -> Self {
        self.services.insert(
            service_id.into(),
            Instances {
                urls,
                cursor: AtomicUsize::new(0),
            },
        );
        self
    }
}

#[async_trait]
impl ServiceInstanceChooser for StaticServiceInstanceChooser {
    async fn choose(&self, service_id: &str) -> Result<Url> {
        let instances = self
            .services
            .get(service_id)
            .filter(|i| !i.urls.is_empty())
            .ok_or_else(|| {
                Error::runtime_with_context(
                    format!("no instance available for service '{}'", service_id),
                    ErrorContext::new().with_source("service_instance_chooser"),
                )
            })?;
        let n = instances.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(instances.urls[n % instances.urls.len()].clone())
    }
}

/// Points the request at a chosen instance, keeping path and query.
pub struct ServiceDiscoveryInterceptor {
    service_id: String,
    chooser: Arc<dyn ServiceInstanceChooser>,
}

impl ServiceDiscoveryInterceptor {
    pub fn new(service_id: impl Into<String>, chooser: Arc<dyn ServiceInstanceChooser>) -> Self {
        Self {
            service_id: service_id.into(),
            chooser,
        }
    }
}

fn retarget(url: &mut Url, instance: &Url) -> Result<()> {
    let invalid = |what: &str| {
        Error::runtime_with_context(
            format!("cannot apply instance {} to {}: bad {}", instance, url, what),
            ErrorContext::new().with_source("service_discovery"),
        )
    };
    let mut rewritten = url.clone();
    rewritten
        .set_scheme(instance.scheme())
        .map_err(|_| invalid("scheme"))?;
    rewritten
        .set_host(instance.host_str())
        .map_err(|_| invalid("host"))?;
    rewritten
        .set_port(instance.port())
        .map_err(|_| invalid("port"))?;
    *url = rewritten;
    Ok(())
}

#[async_trait]
impl Interceptor for ServiceDiscoveryInterceptor {
    fn name(&self) -> &str {
        "service_discovery"
    }

    async fn intercept(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        let instance = self.chooser.choose(&self.service_id).await?;
        retarget(&mut request.url, &instance)?;
        trace!(service = %self.service_id, url = %request.url, "resolved service instance");
        next.run(request).await
    }
}
