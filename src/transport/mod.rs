//! Transport seam.
//!
//! The interceptor chain ends in a [`Transport`]. The default implementation
//! is [`HttpTransport`] over `reqwest`; a [`TransportFactory`] decides how
//! the resolved [`TransportSettings`] turn into a transport instance.

mod http;
pub mod pool;

pub use http::{HttpTransport, ReqwestTransportFactory};
pub use pool::{ConnectionPool, ConnectionPoolRegistry, ConnectionProfile};

use crate::descriptor::{ClientDescriptor, OperationDescriptor};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Which operation of which client produced a request.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub descriptor: Arc<ClientDescriptor>,
    pub operation: Arc<OperationDescriptor>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    invocation: Option<Arc<Invocation>>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            invocation: None,
        }
    }

    pub fn with_invocation(mut self, invocation: Arc<Invocation>) -> Self {
        self.invocation = Some(invocation);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn invocation(&self) -> Option<&Arc<Invocation>> {
        self.invocation.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL after redirects.
    pub url: Url,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Terminal stage of every interceptor chain.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

/// Timeouts after per-client/global resolution. `None` disables that timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTimeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
    pub call: Option<Duration>,
}

impl EffectiveTimeouts {
    pub(crate) fn resolve(own: Option<u64>, global: u64) -> Option<Duration> {
        let ms = own.unwrap_or(global);
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}

/// Everything the transport is configured with.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub pool_name: String,
    pub pool: Arc<ConnectionPool>,
    pub timeouts: EffectiveTimeouts,
    pub retry_on_connection_failure: bool,
    pub follow_redirects: bool,
    pub follow_ssl_redirects: bool,
    pub ping_interval: Option<Duration>,
}

impl TransportSettings {
    pub fn connection_profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            connect_timeout: self.timeouts.connect,
            read_timeout: self.timeouts.read,
            follow_redirects: self.follow_redirects,
            follow_ssl_redirects: self.follow_ssl_redirects,
            ping_interval: self.ping_interval,
        }
    }
}

pub trait TransportFactory: Send + Sync {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>>;
}

impl std::fmt::Debug for dyn TransportFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TransportFactory")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_resolution() {
        assert_eq!(
            EffectiveTimeouts::resolve(None, 1500),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            EffectiveTimeouts::resolve(Some(10), 1500),
            Some(Duration::from_millis(10))
        );
        assert_eq!(EffectiveTimeouts::resolve(None, 0), None);
        assert_eq!(EffectiveTimeouts::resolve(Some(0), 1500), None);
    }
}
