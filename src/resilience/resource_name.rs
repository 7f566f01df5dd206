//! Stable breaker resource names.

use crate::cache::CopyOnWriteMap;
use crate::descriptor::{ClientDescriptor, OperationDescriptor};
use crate::environment::Environment;
use crate::Result;

pub const RESOURCE_PREFIX: &str = "HTTP_OUT";

pub trait ResourceNameResolver: Send + Sync {
    fn resource_name(
        &self,
        descriptor: &ClientDescriptor,
        operation: &OperationDescriptor,
        env: &dyn Environment,
    ) -> Result<String>;
}

/// `HTTP_OUT:{METHOD}:{base url}/{operation path}` with exactly one slash at the join.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResourceNameResolver;

impl ResourceNameResolver for DefaultResourceNameResolver {
    fn resource_name(
        &self,
        descriptor: &ClientDescriptor,
        operation: &OperationDescriptor,
        env: &dyn Environment,
    ) -> Result<String> {
        let base = descriptor.convert_base_url(env)?;
        Ok(format!(
            "{}:{}:{}/{}",
            RESOURCE_PREFIX,
            operation.method.as_str(),
            base.trim_end_matches('/'),
            operation.path.trim_start_matches('/')
        ))
    }
}

/// Memoises another resolver per `(client id, operation name)`.
pub struct CachedResourceNameResolver<R = DefaultResourceNameResolver> {
    inner: R,
    names: CopyOnWriteMap<(String, String), String>,
}

impl<R: ResourceNameResolver> CachedResourceNameResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            names: CopyOnWriteMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CachedResourceNameResolver {
    fn default() -> Self {
        Self::new(DefaultResourceNameResolver)
    }
}

impl<R: ResourceNameResolver> ResourceNameResolver for CachedResourceNameResolver<R> {
    fn resource_name(
        &self,
        descriptor: &ClientDescriptor,
        operation: &OperationDescriptor,
        env: &dyn Environment,
    ) -> Result<String> {
        let key = (descriptor.id.clone(), operation.name.clone());
        self.names.get_or_try_insert_with(&key, || {
            self.inner.resource_name(descriptor, operation, env)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MapEnvironment;

    fn descriptor() -> ClientDescriptor {
        ClientDescriptor::new("users")
            .with_base_url("${users.host}/api/")
            .with_operation(OperationDescriptor::get("get_user", "/users/{id}"))
    }

    #[test]
    fn test_default_name_joins_with_one_slash() {
        let env = MapEnvironment::new().with("users.host", "http://users.local:8080");
        let d = descriptor();
        let op = d.operation("get_user").unwrap();
        let name = DefaultResourceNameResolver
            .resource_name(&d, op, &env)
            .unwrap();
        assert_eq!(name, "HTTP_OUT:GET:http://users.local:8080/api/users/{id}");
    }

    #[test]
    fn test_service_id_name() {
        let env = MapEnvironment::new();
        let d = ClientDescriptor::new("orders")
            .with_service_id("order-service")
            .with_path("/v1/")
            .with_operation(OperationDescriptor::post("create", "orders"));
        let op = d.operation("create").unwrap();
        let name = DefaultResourceNameResolver
            .resource_name(&d, op, &env)
            .unwrap();
        assert_eq!(name, "HTTP_OUT:POST:http://order-service/v1/orders");
    }

    #[test]
    fn test_cached_name_is_stable_across_resolvers() {
        let env = MapEnvironment::new().with("users.host", "http://users.local");
        let d = descriptor();
        let op = d.operation("get_user").unwrap();

        let first = CachedResourceNameResolver::default();
        let a = first.resource_name(&d, op, &env).unwrap();
        let b = first.resource_name(&d, op, &env).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.len(), 1);

        let restarted = CachedResourceNameResolver::default();
        assert_eq!(restarted.resource_name(&d, op, &env).unwrap(), a);
    }

    #[test]
    fn test_unresolvable_placeholder_is_configuration_error() {
        let d = descriptor();
        let op = d.operation("get_user").unwrap();
        let err = CachedResourceNameResolver::default()
            .resource_name(&d, op, &MapEnvironment::new())
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
