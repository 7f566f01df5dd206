use super::{BreakerEntry, CallOutcome, DegradeEngine, DegradeRule, ResourceNameResolver};
use crate::descriptor::{ClientDescriptor, DegradeSpec, DegradeStrategy};
use crate::environment::Environment;
use crate::interceptors::{Interceptor, Next};
use crate::transport::{Request, Response};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Generates and submits breaker rules for a client. Cold path, runs once per build.
pub struct DegradeRuleRegistrar {
    enabled: bool,
    engine: Option<Arc<dyn DegradeEngine>>,
    resolver: Arc<dyn ResourceNameResolver>,
    environment: Arc<dyn Environment>,
}

impl DegradeRuleRegistrar {
    pub fn new(
        enabled: bool,
        engine: Option<Arc<dyn DegradeEngine>>,
        resolver: Arc<dyn ResourceNameResolver>,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            enabled,
            engine,
            resolver,
            environment,
        }
    }

    /// Rules for every remote operation with an effective declaration.
    pub fn rules_for(&self, descriptor: &ClientDescriptor) -> Result<Vec<DegradeRule>> {
        let mut rules = Vec::new();
        for op in &descriptor.operations {
            let Some(spec) = descriptor.effective_degrade(op) else {
                continue;
            };
            validate(&spec, &descriptor.id, &op.name)?;
            let resource = self
                .resolver
                .resource_name(descriptor, op, self.environment.as_ref())?;
            rules.push(DegradeRule {
                resource,
                count: spec.count,
                time_window: spec.time_window,
                strategy: spec.strategy,
            });
        }
        Ok(rules)
    }

    /// Submit the client's rules in one batch. Returns how many were loaded.
    pub fn register_rules(&self, descriptor: &ClientDescriptor) -> Result<usize> {
        let engine = match (&self.engine, self.enabled) {
            (Some(engine), true) => engine,
            _ => return Ok(0),
        };
        let rules = self.rules_for(descriptor)?;
        let n = rules.len();
        if n > 0 {
            engine.load_rules(rules)?;
            info!(client = %descriptor.id, rules = n, "loaded degrade rules");
        }
        Ok(n)
    }
}

fn validate(spec: &DegradeSpec, client: &str, operation: &str) -> Result<()> {
    let problem = if !spec.count.is_finite() || spec.count < 0.0 {
        Some(format!("count must be a finite non-negative number, got {}", spec.count))
    } else if spec.strategy == DegradeStrategy::ExceptionRatio && spec.count > 1.0 {
        Some(format!("exception ratio must be within [0, 1], got {}", spec.count))
    } else if spec.time_window == 0 {
        Some("time_window must be at least one second".to_string())
    } else {
        None
    };
    match problem {
        None => Ok(()),
        Some(message) => Err(Error::configuration_with_context(
            message,
            ErrorContext::new()
                .with_field_path(format!("{}.{}.degrade", client, operation))
                .with_source("degrade_rule_registrar"),
        )),
    }
}

/// Guards declared operations with an engine entry for the length of the call.
pub struct DegradeInterceptor {
    engine: Arc<dyn DegradeEngine>,
    resolver: Arc<dyn ResourceNameResolver>,
    environment: Arc<dyn Environment>,
}

impl DegradeInterceptor {
    pub fn new(
        engine: Arc<dyn DegradeEngine>,
        resolver: Arc<dyn ResourceNameResolver>,
        environment: Arc<dyn Environment>,
    ) -> Self {
        Self {
            engine,
            resolver,
            environment,
        }
    }

    async fn guarded(&self, resource: String, request: Request, next: Next<'_>) -> Result<Response> {
        let entry = self.engine.enter(&resource).map_err(|signal| {
            debug!(resource = %resource, reason = %signal.reason, "call blocked by degrade engine");
            Error::CircuitOpen {
                resource: resource.clone(),
                signal,
            }
        })?;
        let mut guard = BreakerEntry::new(entry);
        let result = next.run(request).await;
        guard.record(match result {
            Ok(_) => CallOutcome::Success,
            Err(_) => CallOutcome::Failure,
        });
        result
    }
}

#[async_trait]
impl Interceptor for DegradeInterceptor {
    fn name(&self) -> &str {
        "degrade"
    }

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let Some(invocation) = request.invocation().cloned() else {
            return next.run(request).await;
        };
        if invocation
            .descriptor
            .effective_degrade(&invocation.operation)
            .is_none()
        {
            return next.run(request).await;
        }
        let resource = self.resolver.resource_name(
            &invocation.descriptor,
            &invocation.operation,
            self.environment.as_ref(),
        )?;
        self.guarded(resource, request, next).await
    }
}
