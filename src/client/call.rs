//! Per-call request builder.

use crate::client::core::{BuiltClient, OperationBinding};
use crate::transport::{Request, Response};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// One invocation of a client operation.
///
/// ```rust,no_run
/// # async fn demo(client: &retrofit_rust::BuiltClient) -> retrofit_rust::Result<()> {
/// #[derive(serde::Deserialize)]
/// struct User { id: u64, name: String }
///
/// let user: User = client
///     .call("get_user")
///     .path_param("id", 7)
///     .query("expand", "profile")
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct OperationCall<'a> {
    client: &'a BuiltClient,
    operation: String,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    json: bool,
    error: Option<Error>,
}

impl<'a> OperationCall<'a> {
    pub(crate) fn new(client: &'a BuiltClient, operation: &str) -> Self {
        Self {
            client,
            operation: operation.to_string(),
            path_params: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            json: false,
            error: None,
        }
    }

    /// Fill `{name}` in the operation path. The value is percent-encoded.
    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.push((name.into(), value.to_string()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.json = true;
            }
            Err(e) => self.error = Some(Error::Serialization(e)),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self.json = false;
        self
    }

    /// Execute, then convert and adapt the response into `T`.
    pub async fn send<T: DeserializeOwned>(self) -> Result<T> {
        let client = self.client;
        let binding = client.binding(&self.operation)?;
        let request = self.into_request(&binding)?;
        let response = dispatch(client, request).await?;
        let value = binding
            .call_adapter
            .adapt(&response, binding.converter.as_ref())?;
        Ok(serde_json::from_value(value)?)
    }

    /// Execute and return the raw response.
    pub async fn send_response(self) -> Result<Response> {
        let client = self.client;
        let binding = client.binding(&self.operation)?;
        let request = self.into_request(&binding)?;
        dispatch(client, request).await
    }

    fn into_request(self, binding: &OperationBinding) -> Result<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let operation = binding.operation();
        let invalid = |message: String| {
            Error::runtime_with_context(
                message,
                ErrorContext::new()
                    .with_field_path(format!("{}.{}", self.client.descriptor().id, operation.name))
                    .with_source("operation_call"),
            )
        };

        let mut path = operation.path.clone();
        for (name, value) in &self.path_params {
            path = path.replace(&format!("{{{}}}", name), &encode_path_segment(value));
        }
        if let Some(start) = path.find('{') {
            let end = path[start..].find('}').map(|i| start + i + 1).unwrap_or(path.len());
            return Err(invalid(format!("unfilled path parameter {}", &path[start..end])));
        }

        let mut url = self
            .client
            .base_url()
            .join(path.trim_start_matches('/'))
            .map_err(|e| invalid(format!("cannot join '{}' onto base url: {}", path, e)))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }

        let mut request = Request::new(operation.method.clone(), url)
            .with_invocation(binding.invocation.clone());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("invalid value for header '{}': {}", name, e)))?;
            request.headers.append(name, value);
        }
        if self.json && !request.headers.contains_key(CONTENT_TYPE) {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        request.body = self.body;
        Ok(request)
    }
}

async fn dispatch(client: &BuiltClient, request: Request) -> Result<Response> {
    let call_id = Uuid::new_v4();
    debug!(
        call_id = %call_id,
        client = %client.descriptor().id,
        method = %request.method,
        url = %request.url,
        "dispatching call"
    );
    let result = client.execute(request).await;
    if let Err(err) = &result {
        debug!(call_id = %call_id, error = %err, "call failed");
    }
    result
}

/// RFC 3986 unreserved characters stay literal inside a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_encoding() {
        assert_eq!(encode_path_segment("abc-1.2_~"), "abc-1.2_~");
        assert_eq!(encode_path_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_path_segment("é"), "%C3%A9");
        assert_eq!(encode_path_segment("a?b#c"), "a%3Fb%23c");
    }
}
