//! Interceptor chain for outgoing calls.
//!
//! Each interceptor receives the request plus a [`Next`] handle to the rest
//! of the chain and decides whether, and how often, to forward. The chain
//! terminates in a [`Transport`]. Order of a built client:
//!
//! ```text
//! degrade -> service discovery -> error decoder -> path-match marks
//!        -> global interceptors -> retry -> logging -> network interceptors
//!        -> transport
//! ```

pub mod assembler;
mod error_decoder;
mod logging;
mod path_match;
mod retry;
mod service_discovery;

pub use assembler::InterceptorAssembler;
pub use error_decoder::{DefaultErrorDecoder, ErrorDecoder, ErrorDecoderInterceptor};
pub use logging::{DefaultLoggingInterceptorFactory, LoggingInterceptor, LoggingInterceptorFactory};
pub use path_match::{AntPathMatcher, InterceptAttributes, PathMatchHandler, PathMatchInterceptor};
pub use retry::RetryInterceptor;
pub use service_discovery::{
    ServiceDiscoveryInterceptor, ServiceInstanceChooser, StaticServiceInstanceChooser,
};

use crate::transport::{Request, Response, Transport};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Stable name, used for chain introspection and logs.
    fn name(&self) -> &str;

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response>;
}

/// The remainder of the chain after the current interceptor.
///
/// `Copy`, so an interceptor may forward more than once (retry).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Interceptor>], transport: &'a dyn Transport) -> Self {
        Self {
            rest: chain,
            transport,
        }
    }

    pub async fn run(self, request: Request) -> Result<Response> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                head.intercept(
                    request,
                    Next {
                        rest: tail,
                        transport: self.transport,
                    },
                )
                .await
            }
            None => self.transport.execute(request).await,
        }
    }
}

/// An assembled, immutable chain in front of one transport.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport: Arc<dyn Transport>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            interceptors,
            transport,
        }
    }

    pub async fn execute(&self, request: Request) -> Result<Response> {
        Next::new(&self.interceptors, self.transport.as_ref())
            .run(request)
            .await
    }

    pub fn names(&self) -> Vec<String> {
        self.interceptors.iter().map(|i| i.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport answering from a script of statuses; the last one repeats.
    pub struct ScriptedTransport {
        statuses: Vec<u16>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        pub fn new(statuses: Vec<u16>) -> Self {
            Self {
                statuses,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: Request) -> Result<Response> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.statuses[n.min(self.statuses.len() - 1)];
            let url = request.url.clone();
            self.seen.lock().unwrap().push(request);
            Ok(Response {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"{}"),
                url,
            })
        }
    }

    pub fn request(url: &str) -> Request {
        Request::new(reqwest::Method::GET, url::Url::parse(url).unwrap())
    }
}
