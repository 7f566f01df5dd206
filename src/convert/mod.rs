//! Call adapters and body converters.
//!
//! For each operation the client picks the first call-adapter factory and the
//! first converter factory (descriptor list, then global list) that accept
//! the operation's [`ReturnType`]. The converter turns body bytes into a
//! `serde_json::Value`; the call adapter shapes that value together with the
//! raw response into what the caller deserializes.

use crate::component::component_type;
use crate::descriptor::{ReturnKind, ReturnType};
use crate::transport::Response;
use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ResponseConverter: Send + Sync {
    fn convert(&self, body: &Bytes) -> Result<Value>;
}

pub trait ConverterFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Converter for the body type, if this factory handles it.
    fn response_converter(&self, return_type: &ReturnType) -> Option<Arc<dyn ResponseConverter>>;
}

pub trait CallAdapter: Send + Sync {
    fn adapt(&self, response: &Response, converter: &dyn ResponseConverter) -> Result<Value>;
}

pub trait CallAdapterFactory: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, return_type: &ReturnType) -> Option<Arc<dyn CallAdapter>>;
}

component_type!(CallAdapterFactory);
component_type!(ConverterFactory);

/// Shape produced by [`ResponseCallAdapterFactory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse<T> {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: T,
}

struct JsonConverter;

impl ResponseConverter for JsonConverter {
    fn convert(&self, body: &Bytes) -> Result<Value> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(body)?)
    }
}

/// serde_json for every body type. Register it last; it accepts everything.
#[derive(Debug, Default)]
pub struct JsonConverterFactory;

impl ConverterFactory for JsonConverterFactory {
    fn name(&self) -> &str {
        "json"
    }

    fn response_converter(&self, _return_type: &ReturnType) -> Option<Arc<dyn ResponseConverter>> {
        Some(Arc::new(JsonConverter))
    }
}

struct TextConverter;

impl ResponseConverter for TextConverter {
    fn convert(&self, body: &Bytes) -> Result<Value> {
        Ok(Value::String(String::from_utf8_lossy(body).into_owned()))
    }
}

/// Raw text for `String` bodies.
#[derive(Debug, Default)]
pub struct TextConverterFactory;

impl ConverterFactory for TextConverterFactory {
    fn name(&self) -> &str {
        "text"
    }

    fn response_converter(&self, return_type: &ReturnType) -> Option<Arc<dyn ResponseConverter>> {
        match return_type.body_type.as_str() {
            "String" | "str" | "text" => Some(Arc::new(TextConverter)),
            _ => None,
        }
    }
}

struct BodyCallAdapter {
    discard: bool,
}

impl CallAdapter for BodyCallAdapter {
    fn adapt(&self, response: &Response, converter: &dyn ResponseConverter) -> Result<Value> {
        if self.discard {
            return Ok(Value::Null);
        }
        converter.convert(&response.body)
    }
}

/// Returns the converted body for `Body` operations and nothing for `Unit` ones.
#[derive(Debug, Default)]
pub struct BodyCallAdapterFactory;

impl CallAdapterFactory for BodyCallAdapterFactory {
    fn name(&self) -> &str {
        "body"
    }

    fn get(&self, return_type: &ReturnType) -> Option<Arc<dyn CallAdapter>> {
        match return_type.kind {
            ReturnKind::Body => Some(Arc::new(BodyCallAdapter { discard: false })),
            ReturnKind::Unit => Some(Arc::new(BodyCallAdapter { discard: true })),
            ReturnKind::Response => None,
        }
    }
}

struct ResponseCallAdapter;

impl CallAdapter for ResponseCallAdapter {
    fn adapt(&self, response: &Response, converter: &dyn ResponseConverter) -> Result<Value> {
        let headers: HashMap<String, String> = response
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let envelope = HttpResponse {
            status: response.status.as_u16(),
            headers,
            body: converter.convert(&response.body)?,
        };
        Ok(serde_json::to_value(envelope)?)
    }
}

/// Wraps status and headers around the body for `Response` operations.
#[derive(Debug, Default)]
pub struct ResponseCallAdapterFactory;

impl CallAdapterFactory for ResponseCallAdapterFactory {
    fn name(&self) -> &str {
        "response"
    }

    fn get(&self, return_type: &ReturnType) -> Option<Arc<dyn CallAdapter>> {
        match return_type.kind {
            ReturnKind::Response => Some(Arc::new(ResponseCallAdapter)),
            _ => None,
        }
    }
}
