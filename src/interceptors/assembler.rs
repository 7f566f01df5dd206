//! Interceptor marks to path-matching interceptors.

use super::path_match::{AntPathMatcher, InterceptAttributes, PathMatchInterceptor};
use crate::component::ComponentProvider;
use crate::descriptor::{AttributeValue, ClientDescriptor, InterceptMark};
use crate::environment::Environment;
use crate::{Error, ErrorContext, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct InterceptorAssembler {
    environment: Arc<dyn Environment>,
    components: Arc<dyn ComponentProvider>,
}

impl InterceptorAssembler {
    pub fn new(environment: Arc<dyn Environment>, components: Arc<dyn ComponentProvider>) -> Self {
        Self {
            environment,
            components,
        }
    }

    /// One interceptor per mark, in declaration order.
    pub fn resolve(&self, descriptor: &ClientDescriptor) -> Result<Vec<PathMatchInterceptor>> {
        descriptor
            .intercepts
            .iter()
            .enumerate()
            .map(|(index, mark)| self.resolve_mark(descriptor, index, mark))
            .collect()
    }

    fn resolve_mark(
        &self,
        descriptor: &ClientDescriptor,
        index: usize,
        mark: &InterceptMark,
    ) -> Result<PathMatchInterceptor> {
        let missing = |what: &str| {
            Error::configuration_with_context(
                format!("interceptor mark is missing '{}'", what),
                ErrorContext::new()
                    .with_field_path(format!("intercepts[{}].{}", index, what))
                    .with_details(format!("client={}", descriptor.id))
                    .with_source("interceptor_assembler"),
            )
        };

        let handler_type = mark.handler.ok_or_else(|| missing("handler"))?;
        let attributes = self.resolve_attributes(&mark.attributes);
        let include = attributes
            .get(InterceptMark::INCLUDE)
            .and_then(AttributeValue::as_list)
            .ok_or_else(|| missing(InterceptMark::INCLUDE))?;
        let exclude = attributes
            .get(InterceptMark::EXCLUDE)
            .and_then(AttributeValue::as_list)
            .ok_or_else(|| missing(InterceptMark::EXCLUDE))?;
        let matcher = AntPathMatcher::new(include, exclude)?;

        let handler = handler_type.resolve(self.components.as_ref());
        debug!(
            client = %descriptor.id,
            handler = handler_type.simple_name(),
            include = ?include,
            exclude = ?exclude,
            "assembled path-match interceptor"
        );
        Ok(PathMatchInterceptor::new(
            handler,
            matcher,
            InterceptAttributes::new(attributes),
        ))
    }

    fn resolve_attributes(
        &self,
        raw: &BTreeMap<String, AttributeValue>,
    ) -> BTreeMap<String, AttributeValue> {
        let env = self.environment.as_ref();
        raw.iter()
            .map(|(key, value)| {
                let resolved = match value {
                    AttributeValue::Str(s) => AttributeValue::Str(env.resolve_placeholders(s)),
                    AttributeValue::List(items) => AttributeValue::List(
                        items.iter().map(|s| env.resolve_placeholders(s)).collect(),
                    ),
                    other => other.clone(),
                };
                (key.clone(), resolved)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentRegistry, ComponentType, EmptyProvider};
    use crate::environment::MapEnvironment;
    use crate::interceptors::{Next, PathMatchHandler};
    use crate::transport::{Request, Response};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Audit;

    #[async_trait]
    impl PathMatchHandler for Audit {
        fn name(&self) -> &str {
            "audit"
        }

        async fn do_intercept(
            &self,
            request: Request,
            _attributes: &InterceptAttributes,
            next: Next<'_>,
        ) -> Result<Response> {
            next.run(request).await
        }
    }

    fn assembler(env: MapEnvironment) -> InterceptorAssembler {
        InterceptorAssembler::new(Arc::new(env), Arc::new(EmptyProvider))
    }

    #[test]
    fn test_placeholders_resolved_in_strings_and_lists() {
        let env = MapEnvironment::new()
            .with("audit.prefix", "/api")
            .with("audit.tenant", "acme");
        let descriptor = ClientDescriptor::new("c")
            .with_base_url("http://localhost/")
            .with_intercept(
                InterceptMark::new(ComponentType::<dyn PathMatchHandler>::of::<Audit>())
                    .include(["${audit.prefix}/**"])
                    .exclude(["${audit.prefix}/health"])
                    .attr("tenant", "${audit.tenant}")
                    .attr("limit", 5i64),
            );

        let resolved = assembler(env).resolve(&descriptor).unwrap();
        assert_eq!(resolved.len(), 1);
        let attrs = resolved[0].attributes();
        assert_eq!(attrs.str("tenant"), Some("acme"));
        assert_eq!(attrs.i64("limit"), Some(5));
        assert_eq!(attrs.list("include").unwrap(), ["/api/**".to_string()]);
        assert!(resolved[0].matches("/api/users"));
        assert!(!resolved[0].matches("/api/health"));
    }

    #[test]
    fn test_missing_include_is_configuration_error() {
        let descriptor = ClientDescriptor::new("c")
            .with_base_url("http://localhost/")
            .with_intercept(InterceptMark::new(
                ComponentType::<dyn PathMatchHandler>::of::<Audit>(),
            ));
        let err = assembler(MapEnvironment::new()).resolve(&descriptor).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("intercepts[0].include")
        );
    }

    #[test]
    fn test_missing_handler_is_configuration_error() {
        let mark = InterceptMark::default().include(["/**"]).exclude(Vec::<String>::new());
        let descriptor = ClientDescriptor::new("c")
            .with_base_url("http://localhost/")
            .with_intercept(mark);
        let err = assembler(MapEnvironment::new()).resolve(&descriptor).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_handler_prefers_managed_instance() {
        let registry = ComponentRegistry::new();
        registry.register(Arc::new(Audit));
        let descriptor = ClientDescriptor::new("c")
            .with_base_url("http://localhost/")
            .with_intercept(
                InterceptMark::new(ComponentType::<dyn PathMatchHandler>::of::<Audit>())
                    .include(["/**"]),
            );
        let assembler =
            InterceptorAssembler::new(Arc::new(MapEnvironment::new()), Arc::new(registry));
        assert_eq!(assembler.resolve(&descriptor).unwrap().len(), 1);
    }
}
