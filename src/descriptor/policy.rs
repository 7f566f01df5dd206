//! Per-client and per-operation resilience declarations.

use serde::{Deserialize, Serialize};

/// How the external engine decides to open the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeStrategy {
    /// Average response time above `count` milliseconds.
    AverageRt,
    /// Exception ratio above `count` (0.0..=1.0).
    ExceptionRatio,
    /// Exception count above `count`.
    ExceptionCount,
}

impl Default for DegradeStrategy {
    fn default() -> Self {
        DegradeStrategy::AverageRt
    }
}

/// Circuit-breaker declaration. Class level acts as the default for every
/// operation; an operation-level declaration replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradeSpec {
    pub count: f64,
    /// Seconds the circuit stays open once tripped.
    pub time_window: u32,
    #[serde(default)]
    pub strategy: DegradeStrategy,
}

impl DegradeSpec {
    pub fn new(count: f64, time_window: u32) -> Self {
        Self {
            count,
            time_window,
            strategy: DegradeStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: DegradeStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Conditions under which a call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryRule {
    ResponseStatusNot2xx,
    OccurIoException,
    OccurException,
}

/// Retry declaration; overrides the global retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySpec {
    #[serde(default = "default_true")]
    pub enable: bool,
    pub max_retries: u32,
    pub interval_ms: u64,
    pub rules: Vec<RetryRule>,
}

fn default_true() -> bool {
    true
}

impl RetrySpec {
    pub fn new(max_retries: u32, interval_ms: u64) -> Self {
        Self {
            enable: true,
            max_retries,
            interval_ms,
            rules: vec![RetryRule::ResponseStatusNot2xx, RetryRule::OccurIoException],
        }
    }

    pub fn disabled() -> Self {
        Self {
            enable: false,
            ..Self::new(0, 0)
        }
    }

    pub fn with_rules(mut self, rules: Vec<RetryRule>) -> Self {
        self.rules = rules;
        self
    }
}
