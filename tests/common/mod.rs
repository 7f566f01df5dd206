//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use retrofit_rust::interceptors::{InterceptAttributes, Interceptor, Next, PathMatchHandler};
use retrofit_rust::resilience::{
    BlockSignal, CallOutcome, DegradeEngine, DegradeRule, EngineEntry,
};
use retrofit_rust::transport::{
    Request, Response, Transport, TransportError, TransportFactory, TransportSettings,
};
use retrofit_rust::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Breaker engine that only counts. Optionally refuses every entry.
#[derive(Default)]
pub struct CountingEngine {
    pub stats: Arc<EngineStats>,
    pub rules: Mutex<Vec<DegradeRule>>,
    /// Size of every `load_rules` batch, in call order.
    pub batches: Mutex<Vec<usize>>,
    pub block: bool,
}

#[derive(Default)]
pub struct EngineStats {
    pub in_flight: AtomicI64,
    pub entered: AtomicUsize,
    pub successes: AtomicUsize,
    pub failures: AtomicUsize,
    pub cancellations: AtomicUsize,
}

impl CountingEngine {
    pub fn blocking() -> Self {
        Self {
            block: true,
            ..Self::default()
        }
    }

    pub fn in_flight(&self) -> i64 {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    pub fn rules(&self) -> Vec<DegradeRule> {
        self.rules.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

struct CountingEntry(Arc<EngineStats>);

impl EngineEntry for CountingEntry {
    fn exit(self: Box<Self>, outcome: CallOutcome) {
        let counter = match outcome {
            CallOutcome::Success => &self.0.successes,
            CallOutcome::Failure => &self.0.failures,
            CallOutcome::Cancelled => &self.0.cancellations,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DegradeEngine for CountingEngine {
    fn load_rules(&self, rules: Vec<DegradeRule>) -> Result<()> {
        self.batches.lock().unwrap().push(rules.len());
        self.rules.lock().unwrap().extend(rules);
        Ok(())
    }

    fn enter(&self, resource: &str) -> std::result::Result<Box<dyn EngineEntry>, BlockSignal> {
        if self.block {
            return Err(BlockSignal::new(resource, "degrade rule triggered"));
        }
        self.stats.entered.fetch_add(1, Ordering::SeqCst);
        self.stats.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingEntry(Arc::clone(&self.stats))))
    }
}

/// What the stub transport does with every request.
#[derive(Clone)]
pub enum Behavior {
    Reply(u16, &'static str),
    Fail,
    Hang,
}

pub struct StubTransport {
    behavior: Behavior,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        match &self.behavior {
            Behavior::Reply(status, body) => Ok(Response {
                status: StatusCode::from_u16(*status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
                url,
            }),
            Behavior::Fail => Err(Error::Transport(TransportError::Other(
                "connection refused".into(),
            ))),
            Behavior::Hang => futures::future::pending().await,
        }
    }
}

/// Counts transports created and records every request they see.
pub struct StubTransportFactory {
    behavior: Behavior,
    pub created: AtomicUsize,
    pub settings: Mutex<Vec<TransportSettings>>,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl StubTransportFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            created: AtomicUsize::new(0),
            settings: Mutex::new(Vec::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl TransportFactory for StubTransportFactory {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.settings.lock().unwrap().push(settings.clone());
        Ok(Arc::new(StubTransport {
            behavior: self.behavior.clone(),
            requests: Arc::clone(&self.requests),
        }))
    }
}

#[derive(Default)]
pub struct FirstMark;

#[async_trait]
impl PathMatchHandler for FirstMark {
    fn name(&self) -> &str {
        "user-interceptor-1"
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

#[derive(Default)]
pub struct SecondMark;

#[async_trait]
impl PathMatchHandler for SecondMark {
    fn name(&self) -> &str {
        "user-interceptor-2"
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

/// Global application interceptor that tags requests.
pub struct GlobalAudit;

#[async_trait]
impl Interceptor for GlobalAudit {
    fn name(&self) -> &str {
        "global-audit"
    }

    async fn intercept(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        request
            .headers
            .insert("x-audit", reqwest::header::HeaderValue::from_static("1"));
        next.run(request).await
    }
}
