//! Placeholder resolution for externalized configuration.
//!
//! Descriptor strings (base URLs, interceptor attributes) may contain
//! `${key}` or `${key:default}` placeholders that are substituted from an
//! [`Environment`] before they are used.

use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("placeholder pattern is valid")
});

/// Source of property values used for placeholder substitution.
pub trait Environment: Send + Sync {
    fn property(&self, key: &str) -> Option<String>;

    /// Substitute every resolvable placeholder; unknown keys without a default are left as-is.
    fn resolve_placeholders(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                let key = caps[1].trim();
                match (self.property(key), caps.get(2)) {
                    (Some(v), _) => v,
                    (None, Some(default)) => default.as_str().to_string(),
                    (None, None) => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Substitute every placeholder, failing on the first one that cannot be resolved.
    fn resolve_required_placeholders(&self, text: &str) -> Result<String> {
        let mut missing: Option<String> = None;
        let resolved = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let key = caps[1].trim();
            match (self.property(key), caps.get(2)) {
                (Some(v), _) => v,
                (None, Some(default)) => default.as_str().to_string(),
                (None, None) => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(key) => Err(Error::configuration_with_context(
                format!("Could not resolve placeholder '{}'", key),
                ErrorContext::new()
                    .with_details(text.to_string())
                    .with_source("environment"),
            )),
            None => Ok(resolved.into_owned()),
        }
    }
}

/// Explicit key/value properties.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    properties: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}

impl Environment for MapEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }
}

/// Process environment variables. `a.b-c` is also looked up as `A_B_C`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().or_else(|| {
            let relaxed: String = key
                .chars()
                .map(|c| if c == '.' || c == '-' { '_' } else { c.to_ascii_uppercase() })
                .collect();
            std::env::var(relaxed).ok()
        })
    }
}
