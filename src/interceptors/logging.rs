use super::{Interceptor, Next};
use crate::config::{LogLevel, LogStrategy};
use crate::transport::{Request, Response};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

const MAX_LOGGED_BODY: usize = 4096;

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Error => tracing::error!($($arg)+),
            LogLevel::Warn => tracing::warn!($($arg)+),
            LogLevel::Info => tracing::info!($($arg)+),
            LogLevel::Debug => tracing::debug!($($arg)+),
            LogLevel::Trace | LogLevel::Unset => tracing::trace!($($arg)+),
        }
    };
}

/// Network-layer exchange logger.
#[derive(Debug, Clone)]
pub struct LoggingInterceptor {
    level: LogLevel,
    strategy: LogStrategy,
}

impl LoggingInterceptor {
    pub fn new(level: LogLevel, strategy: LogStrategy) -> Self {
        Self { level, strategy }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn strategy(&self) -> LogStrategy {
        self.strategy
    }

    fn headers(&self) -> bool {
        matches!(self.strategy, LogStrategy::Headers | LogStrategy::Body)
    }

    fn body(&self) -> bool {
        self.strategy == LogStrategy::Body
    }
}

fn header_list(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn body_preview(body: &[u8]) -> String {
    let cut = body.len().min(MAX_LOGGED_BODY);
    let mut text = String::from_utf8_lossy(&body[..cut]).into_owned();
    if body.len() > cut {
        text.push_str("...");
    }
    text
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response> {
        if self.strategy == LogStrategy::None {
            return next.run(request).await;
        }

        let method = request.method.clone();
        let url = request.url.clone();
        log_at!(self.level, method = %method, url = %url, "--> request");
        if self.headers() {
            log_at!(self.level, headers = %header_list(&request.headers), "--> headers");
        }
        if self.body() {
            if let Some(body) = &request.body {
                log_at!(self.level, bytes = body.len(), body = %body_preview(body), "--> body");
            }
        }

        let started = Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => {
                log_at!(
                    self.level,
                    method = %method,
                    url = %url,
                    status = response.status.as_u16(),
                    elapsed_ms,
                    "<-- response"
                );
                if self.headers() {
                    log_at!(self.level, headers = %header_list(&response.headers), "<-- headers");
                }
                if self.body() {
                    log_at!(
                        self.level,
                        bytes = response.body.len(),
                        body = %body_preview(&response.body),
                        "<-- body"
                    );
                }
            }
            Err(err) => {
                log_at!(self.level, method = %method, url = %url, elapsed_ms, error = %err, "<-- failed");
            }
        }
        result
    }
}

/// Produces the network logging interceptor for a client.
pub trait LoggingInterceptorFactory: Send + Sync {
    fn create(&self, level: LogLevel, strategy: LogStrategy) -> Arc<dyn Interceptor>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoggingInterceptorFactory;

impl LoggingInterceptorFactory for DefaultLoggingInterceptorFactory {
    fn create(&self, level: LogLevel, strategy: LogStrategy) -> Arc<dyn Interceptor> {
        Arc::new(LoggingInterceptor::new(level, strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{request, ScriptedTransport};
    use super::*;

    #[test]
    fn test_body_preview_truncates() {
        let long = vec![b'a'; MAX_LOGGED_BODY + 10];
        let preview = body_preview(&long);
        assert_eq!(preview.len(), MAX_LOGGED_BODY + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(body_preview(b"ok"), "ok");
    }

    #[tokio::test]
    async fn test_logging_is_transparent() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("trace")
            .with_test_writer()
            .try_init();

        let transport = ScriptedTransport::new(vec![404]);
        let chain = vec![DefaultLoggingInterceptorFactory.create(LogLevel::Debug, LogStrategy::Body)];
        let resp = Next::new(&chain, &transport)
            .run(request("http://localhost/missing").with_body("{\"q\":1}"))
            .await
            .unwrap();
        assert_eq!(resp.status.as_u16(), 404);
        assert_eq!(transport.calls(), 1);
        assert_eq!(chain[0].name(), "logging");
    }
}
