//! Global configuration.
//!
//! Every per-client attribute that is left unset falls back to a value here.
//! Loadable from YAML and overridable through `RETROFIT_*` environment variables.

use crate::descriptor::RetryRule;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Level the network logging interceptor emits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    /// Not configured here; resolve against the global default.
    Unset,
}

/// How much of an exchange the network logging interceptor prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStrategy {
    None,
    /// Request and response lines.
    Basic,
    /// Basic plus headers.
    Headers,
    /// Headers plus bodies.
    Body,
    Unset,
}

impl LogLevel {
    /// `self` unless unset, else `global`; error if both are unset.
    pub fn resolve(self, global: LogLevel) -> Result<LogLevel> {
        match (self, global) {
            (LogLevel::Unset, LogLevel::Unset) => Err(Error::configuration_with_context(
                "log level cannot be unset both per client and globally",
                ErrorContext::new()
                    .with_field_path("log.global_log_level")
                    .with_source("client_builder"),
            )),
            (LogLevel::Unset, g) => Ok(g),
            (own, _) => Ok(own),
        }
    }
}

impl LogStrategy {
    pub fn resolve(self, global: LogStrategy) -> Result<LogStrategy> {
        match (self, global) {
            (LogStrategy::Unset, LogStrategy::Unset) => Err(Error::configuration_with_context(
                "log strategy cannot be unset both per client and globally",
                ErrorContext::new()
                    .with_field_path("log.global_log_strategy")
                    .with_source("client_builder"),
            )),
            (LogStrategy::Unset, g) => Ok(g),
            (own, _) => Ok(own),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle_connections: usize,
    pub keep_alive_second: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 5,
            keep_alive_second: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enable: bool,
    pub global_log_level: LogLevel,
    pub global_log_strategy: LogStrategy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enable: true,
            global_log_level: LogLevel::Info,
            global_log_strategy: LogStrategy::Basic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry operations that carry no retry declaration of their own.
    pub enable_global_retry: bool,
    pub global_max_retries: u32,
    pub global_interval_ms: u64,
    pub global_retry_rules: Vec<RetryRule>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enable_global_retry: false,
            global_max_retries: 2,
            global_interval_ms: 100,
            global_retry_rules: vec![RetryRule::ResponseStatusNot2xx, RetryRule::OccurIoException],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradeConfig {
    /// Attach the degrade interceptor to every client and register rules.
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrofitConfig {
    pub global_connect_timeout_ms: u64,
    pub global_read_timeout_ms: u64,
    pub global_write_timeout_ms: u64,
    /// 0 disables the whole-call timeout.
    pub global_call_timeout_ms: u64,
    pub pool: HashMap<String, PoolConfig>,
    pub log: LogConfig,
    pub retry: RetryConfig,
    pub degrade: DegradeConfig,
    pub disable_void_return_type: bool,
}

impl Default for RetrofitConfig {
    fn default() -> Self {
        let mut pool = HashMap::new();
        pool.insert("default".to_string(), PoolConfig::default());
        Self {
            global_connect_timeout_ms: 10_000,
            global_read_timeout_ms: 10_000,
            global_write_timeout_ms: 10_000,
            global_call_timeout_ms: 0,
            pool,
            log: LogConfig::default(),
            retry: RetryConfig::default(),
            degrade: DegradeConfig::default(),
            disable_void_return_type: false,
        }
    }
}

impl RetrofitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid retrofit configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read retrofit configuration: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `RETROFIT_*` environment overrides:
    /// - `RETROFIT_CONNECT_TIMEOUT_MS`, `RETROFIT_READ_TIMEOUT_MS`,
    ///   `RETROFIT_WRITE_TIMEOUT_MS`, `RETROFIT_CALL_TIMEOUT_MS`
    /// - `RETROFIT_LOG_ENABLE`, `RETROFIT_DEGRADE_ENABLE`, `RETROFIT_GLOBAL_RETRY`
    /// - `RETROFIT_MAX_RETRIES`, `RETROFIT_RETRY_INTERVAL_MS`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_u64("RETROFIT_CONNECT_TIMEOUT_MS") {
            self.global_connect_timeout_ms = v;
        }
        if let Some(v) = env_u64("RETROFIT_READ_TIMEOUT_MS") {
            self.global_read_timeout_ms = v;
        }
        if let Some(v) = env_u64("RETROFIT_WRITE_TIMEOUT_MS") {
            self.global_write_timeout_ms = v;
        }
        if let Some(v) = env_u64("RETROFIT_CALL_TIMEOUT_MS") {
            self.global_call_timeout_ms = v;
        }
        if let Some(v) = env_bool("RETROFIT_LOG_ENABLE") {
            self.log.enable = v;
        }
        if let Some(v) = env_bool("RETROFIT_DEGRADE_ENABLE") {
            self.degrade.enable = v;
        }
        if let Some(v) = env_bool("RETROFIT_GLOBAL_RETRY") {
            self.retry.enable_global_retry = v;
        }
        if let Some(v) = env_u64("RETROFIT_MAX_RETRIES") {
            self.retry.global_max_retries = v.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = env_u64("RETROFIT_RETRY_INTERVAL_MS") {
            self.retry.global_interval_ms = v;
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
