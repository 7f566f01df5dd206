use crate::component::ComponentType;
use crate::interceptors::PathMatchHandler;
use std::collections::BTreeMap;

/// Attribute value of an interceptor marker.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    List(Vec<String>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Str(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::List(v)
    }
}

/// Client-level interceptor marker: a handler type plus its attribute map.
///
/// `include` and `exclude` are required list attributes holding path patterns.
#[derive(Debug, Clone, Default)]
pub struct InterceptMark {
    pub handler: Option<ComponentType<dyn PathMatchHandler>>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl InterceptMark {
    pub const INCLUDE: &'static str = "include";
    pub const EXCLUDE: &'static str = "exclude";

    pub fn new(handler: ComponentType<dyn PathMatchHandler>) -> Self {
        Self {
            handler: Some(handler),
            attributes: BTreeMap::new(),
        }
        .exclude(Vec::<String>::new())
    }

    pub fn include<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = patterns.into_iter().map(Into::into).collect();
        self.attr(Self::INCLUDE, list)
    }

    pub fn exclude<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = patterns.into_iter().map(Into::into).collect();
        self.attr(Self::EXCLUDE, list)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
