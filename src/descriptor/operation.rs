use super::policy::{DegradeSpec, RetrySpec};
use reqwest::Method;

/// How the result of a call is shaped for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// The converted response body.
    Body,
    /// Status, headers and the converted body.
    Response,
    /// No value; the body is discarded.
    Unit,
}

/// Declared return type of an operation. `body_type` is the logical body
/// type name used by converter factories to pick a converter (e.g. `"String"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnType {
    pub kind: ReturnKind,
    pub body_type: String,
}

impl ReturnType {
    pub fn body(body_type: impl Into<String>) -> Self {
        Self {
            kind: ReturnKind::Body,
            body_type: body_type.into(),
        }
    }

    pub fn response(body_type: impl Into<String>) -> Self {
        Self {
            kind: ReturnKind::Response,
            body_type: body_type.into(),
        }
    }

    pub fn unit() -> Self {
        Self {
            kind: ReturnKind::Unit,
            body_type: "()".into(),
        }
    }
}

/// One callable operation of a client.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub method: Method,
    /// Path template relative to the base URL; `{param}` segments are substituted per call.
    pub path: String,
    pub return_type: ReturnType,
    pub is_static: bool,
    pub is_default: bool,
    pub degrade: Option<DegradeSpec>,
    pub retry: Option<RetrySpec>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            return_type: ReturnType::body("Json"),
            is_static: false,
            is_default: false,
            degrade: None,
            retry: None,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::POST, path)
    }

    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::PUT, path)
    }

    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::DELETE, path)
    }

    pub fn returning(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn with_degrade(mut self, spec: DegradeSpec) -> Self {
        self.degrade = Some(spec);
        self
    }

    pub fn with_retry(mut self, spec: RetrySpec) -> Self {
        self.retry = Some(spec);
        self
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Default and static operations never go through the remote call path.
    pub fn is_remote(&self) -> bool {
        !self.is_default && !self.is_static
    }
}
