use super::{Interceptor, Next};
use crate::component::component_type;
use crate::descriptor::AttributeValue;
use crate::transport::{Request, Response};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolved marker attributes, handed to the handler on every matching call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterceptAttributes {
    values: BTreeMap<String, AttributeValue>,
}

impl InterceptAttributes {
    pub fn new(values: BTreeMap<String, AttributeValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(AttributeValue::as_list)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttributeValue::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttributeValue::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.values.iter()
    }
}

/// User hook behind an interceptor marker. Runs only for matching paths.
#[async_trait]
pub trait PathMatchHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn do_intercept(
        &self,
        request: Request,
        attributes: &InterceptAttributes,
        next: Next<'_>,
    ) -> Result<Response>;
}

component_type!(PathMatchHandler);

/// Ant-style include/exclude matcher: `**` spans segments, `*` and `?` stay within one.
#[derive(Debug, Clone)]
pub struct AntPathMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl AntPathMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: include.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            exclude: exclude.iter().map(|p| compile(p)).collect::<Result<_>>()?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.include.iter().any(|re| re.is_match(path))
            && !self.exclude.iter().any(|re| re.is_match(path))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '/' if pattern_continues_with(&chars, "**") => {
                chars.next();
                chars.next();
                out.push_str("(?:/.*)?");
            }
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid path pattern '{}': {}", pattern, e),
            ErrorContext::new().with_source("path_matcher"),
        )
    })
}

fn pattern_continues_with(chars: &std::iter::Peekable<std::str::Chars<'_>>, s: &str) -> bool {
    let ahead: String = chars.clone().take(s.len()).collect();
    ahead == s
}

/// A marker bound to its handler: delegates on matching paths, forwards otherwise.
pub struct PathMatchInterceptor {
    handler: Arc<dyn PathMatchHandler>,
    matcher: AntPathMatcher,
    attributes: InterceptAttributes,
}

impl std::fmt::Debug for PathMatchInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathMatchInterceptor")
            .field("handler", &self.handler.name())
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl PathMatchInterceptor {
    pub fn new(
        handler: Arc<dyn PathMatchHandler>,
        matcher: AntPathMatcher,
        attributes: InterceptAttributes,
    ) -> Self {
        Self {
            handler,
            matcher,
            attributes,
        }
    }

    pub fn attributes(&self) -> &InterceptAttributes {
        &self.attributes
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }
}

#[async_trait]
impl Interceptor for PathMatchInterceptor {
    fn name(&self) -> &str {
        self.handler.name()
    }

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response> {
        if self.matcher.matches(request.url.path()) {
            self.handler
                .do_intercept(request, &self.attributes, next)
                .await
        } else {
            next.run(request).await
        }
    }
}
