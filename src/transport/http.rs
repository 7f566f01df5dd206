use super::{
    ConnectionPool, ConnectionProfile, Request, Response, Transport, TransportError,
    TransportFactory, TransportSettings,
};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Proxy;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

/// `reqwest`-backed terminal transport.
///
/// The underlying `reqwest::Client` belongs to the named connection pool and
/// is shared with every other client of that pool using the same connection
/// profile. The call timeout is applied per request.
pub struct HttpTransport {
    client: reqwest::Client,
    call_timeout: Option<Duration>,
    retry_on_connection_failure: bool,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let profile = settings.connection_profile();
        let client = settings
            .pool
            .client_for(profile, |pool| pooled_client(pool, &profile))?;
        if settings.timeouts.write.is_some() {
            debug!(pool = %settings.pool_name, "write timeout is covered by the call timeout");
        }
        Ok(Self {
            client,
            call_timeout: settings.timeouts.call,
            retry_on_connection_failure: settings.retry_on_connection_failure,
        })
    }

    async fn send_once(&self, request: &Request) -> std::result::Result<Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(t) = self.call_timeout {
            builder = builder.timeout(t);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let url = resp.url().clone();
        let body = resp.bytes().await?;
        Ok(Response {
            status,
            headers,
            body,
            url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        match self.send_once(&request).await {
            Ok(resp) => Ok(resp),
            Err(e) if e.is_connect() && self.retry_on_connection_failure => {
                debug!(url = %request.url, error = %e, "connection failed, retrying once");
                self.send_once(&request)
                    .await
                    .map_err(|e| Error::Transport(TransportError::Http(e)))
            }
            Err(e) => Err(Error::Transport(TransportError::Http(e))),
        }
    }
}

fn pooled_client(pool: &ConnectionPool, profile: &ConnectionProfile) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool.max_idle_connections)
        .pool_idle_timeout(Some(pool.keep_alive))
        .redirect(redirect_policy(
            profile.follow_redirects,
            profile.follow_ssl_redirects,
        ));
    if let Some(t) = profile.connect_timeout {
        builder = builder.connect_timeout(t);
    }
    if let Some(t) = profile.read_timeout {
        builder = builder.read_timeout(t);
    }
    if let Some(interval) = profile.ping_interval {
        builder = builder
            .http2_keep_alive_interval(Some(interval))
            .http2_keep_alive_timeout(Duration::from_secs(10))
            .http2_keep_alive_while_idle(true);
    }

    if let Ok(proxy_url) = env::var("RETROFIT_PROXY_URL") {
        match Proxy::all(&proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
        }
    }

    builder
        .build()
        .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))
}

fn redirect_policy(follow: bool, follow_ssl: bool) -> Policy {
    if !follow {
        return Policy::none();
    }
    if follow_ssl {
        return Policy::limited(MAX_REDIRECTS);
    }
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let crosses_scheme = attempt
            .previous()
            .last()
            .map(|prev| prev.scheme() != attempt.url().scheme())
            .unwrap_or(false);
        if crosses_scheme {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Builds one [`HttpTransport`] per client over the pool's shared `reqwest::Client`.
#[derive(Debug, Default)]
pub struct ReqwestTransportFactory;

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::new(settings)?))
    }
}
