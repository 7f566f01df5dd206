use super::{Interceptor, Next};
use crate::config::RetryConfig;
use crate::descriptor::RetryRule;
use crate::transport::{Request, Response};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RetryPlan {
    max_retries: u32,
    interval_ms: u64,
    rules: Vec<RetryRule>,
}

impl RetryPlan {
    fn should_retry_error(&self, err: &Error) -> bool {
        self.rules.contains(&RetryRule::OccurException)
            || (self.rules.contains(&RetryRule::OccurIoException) && err.is_transport())
    }
}

/// Re-issues a call according to the operation's retry declaration, falling
/// back to the global policy when `enable_global_retry` is set.
///
/// A non-2xx response is retried only under `ResponseStatusNot2xx`; once
/// retries run out the last response is returned as is. Errors that the
/// rules do not cover propagate immediately; covered ones end in
/// [`Error::RetryExhausted`].
pub struct RetryInterceptor {
    global: RetryConfig,
}

impl RetryInterceptor {
    pub fn new(global: RetryConfig) -> Self {
        Self { global }
    }

    fn plan(&self, request: &Request) -> Option<RetryPlan> {
        let declared = request
            .invocation()
            .and_then(|inv| inv.descriptor.effective_retry(&inv.operation).cloned());
        match declared {
            Some(spec) if spec.enable => Some(RetryPlan {
                max_retries: spec.max_retries,
                interval_ms: spec.interval_ms,
                rules: spec.rules,
            }),
            Some(_) => None,
            None if self.global.enable_global_retry => Some(RetryPlan {
                max_retries: self.global.global_max_retries,
                interval_ms: self.global.global_interval_ms,
                rules: self.global.global_retry_rules.clone(),
            }),
            None => None,
        }
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    fn name(&self) -> &str {
        "retry"
    }

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response> {
        let plan = match self.plan(&request) {
            Some(plan) if plan.max_retries > 0 => plan,
            _ => return next.run(request).await,
        };

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let exhausted = attempts > plan.max_retries;
            match next.run(request.clone()).await {
                Ok(response) => {
                    if response.is_success()
                        || !plan.rules.contains(&RetryRule::ResponseStatusNot2xx)
                        || exhausted
                    {
                        return Ok(response);
                    }
                    debug!(
                        url = %request.url,
                        status = response.status.as_u16(),
                        attempt = attempts,
                        "retrying non-2xx response"
                    );
                }
                Err(err) => {
                    if !plan.should_retry_error(&err) {
                        return Err(err);
                    }
                    if exhausted {
                        return Err(Error::RetryExhausted {
                            attempts,
                            interval_ms: plan.interval_ms,
                            last: Box::new(err),
                        });
                    }
                    debug!(url = %request.url, error = %err, attempt = attempts, "retrying failed call");
                }
            }
            tokio::time::sleep(Duration::from_millis(plan.interval_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{request, ScriptedTransport};
    use super::*;
    use crate::descriptor::{ClientDescriptor, OperationDescriptor, RetrySpec};
    use crate::transport::{Invocation, Transport, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn invocation(op: OperationDescriptor) -> Arc<Invocation> {
        let descriptor = Arc::new(
            ClientDescriptor::new("svc")
                .with_base_url("http://localhost/")
                .with_operation(op),
        );
        let operation = Arc::clone(&descriptor.operations[0]);
        Arc::new(Invocation {
            descriptor,
            operation,
        })
    }

    async fn run(
        interceptor: RetryInterceptor,
        transport: &dyn Transport,
        req: Request,
    ) -> Result<Response> {
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(interceptor)];
        Next::new(&chain, transport).run(req).await
    }

    #[tokio::test]
    async fn test_non_2xx_retried_until_success() {
        let transport = ScriptedTransport::new(vec![503, 502, 200]);
        let op = OperationDescriptor::get("list", "items").with_retry(RetrySpec::new(3, 1));
        let req = request("http://localhost/items").with_invocation(invocation(op));
        let resp = run(RetryInterceptor::new(RetryConfig::default()), &transport, req)
            .await
            .unwrap();
        assert!(resp.is_success());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_non_2xx_returns_last_response() {
        let transport = ScriptedTransport::new(vec![500]);
        let op = OperationDescriptor::get("list", "items").with_retry(RetrySpec::new(2, 1));
        let req = request("http://localhost/items").with_invocation(invocation(op));
        let resp = run(RetryInterceptor::new(RetryConfig::default()), &transport, req)
            .await
            .unwrap();
        assert_eq!(resp.status.as_u16(), 500);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_no_declaration_and_global_off_means_single_call() {
        let transport = ScriptedTransport::new(vec![500]);
        let req = request("http://localhost/items");
        run(RetryInterceptor::new(RetryConfig::default()), &transport, req)
            .await
            .unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_declaration_wins_over_global() {
        let transport = ScriptedTransport::new(vec![500]);
        let global = RetryConfig {
            enable_global_retry: true,
            ..RetryConfig::default()
        };
        let op = OperationDescriptor::get("list", "items").with_retry(RetrySpec::disabled());
        let req = request("http://localhost/items").with_invocation(invocation(op));
        run(RetryInterceptor::new(global), &transport, req).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }

    struct Failing {
        calls: AtomicUsize,
        io: bool,
    }

    #[async_trait]
    impl Transport for Failing {
        async fn execute(&self, _request: Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.io {
                Err(Error::Transport(TransportError::Other("connection reset".into())))
            } else {
                Err(Error::runtime("codec blew up"))
            }
        }
    }

    #[tokio::test]
    async fn test_io_errors_exhaust_into_retry_exhausted() {
        let transport = Failing {
            calls: AtomicUsize::new(0),
            io: true,
        };
        let global = RetryConfig {
            enable_global_retry: true,
            global_max_retries: 2,
            global_interval_ms: 1,
            ..RetryConfig::default()
        };
        let err = run(RetryInterceptor::new(global), &transport, request("http://localhost/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_io_error_not_retried_without_occur_exception() {
        let transport = Failing {
            calls: AtomicUsize::new(0),
            io: false,
        };
        let op = OperationDescriptor::get("list", "items").with_retry(RetrySpec::new(3, 1));
        let req = request("http://localhost/items").with_invocation(invocation(op.clone()));
        let err = run(RetryInterceptor::new(RetryConfig::default()), &transport, req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let any = op.with_retry(RetrySpec::new(1, 1).with_rules(vec![RetryRule::OccurException]));
        let req = request("http://localhost/items").with_invocation(invocation(any));
        let err = run(RetryInterceptor::new(RetryConfig::default()), &transport, req)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { attempts: 2, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }
}
