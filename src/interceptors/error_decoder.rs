use super::{Interceptor, Next};
use crate::component::component_type;
use crate::transport::{Request, Response, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Translates call failures into domain errors.
pub trait ErrorDecoder: Send + Sync {
    /// Error for a response that should not reach the caller, if any.
    fn invalid_response(&self, request: &Request, response: &Response) -> Option<Error> {
        if response.is_success() {
            return None;
        }
        Some(Error::Status {
            status: response.status.as_u16(),
            method: request.method.to_string(),
            url: request.url.to_string(),
            body: response.text(),
        })
    }

    fn io_error(&self, _request: &Request, error: TransportError) -> Error {
        Error::Transport(error)
    }

    fn other_error(&self, _request: &Request, error: Error) -> Error {
        error
    }
}

/// Non-2xx becomes [`Error::Status`]; everything else passes through.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorDecoder;

impl ErrorDecoder for DefaultErrorDecoder {}

component_type!(ErrorDecoder);

pub struct ErrorDecoderInterceptor {
    decoder: Arc<dyn ErrorDecoder>,
}

impl ErrorDecoderInterceptor {
    pub fn new(decoder: Arc<dyn ErrorDecoder>) -> Self {
        Self { decoder }
    }
}

#[async_trait]
impl Interceptor for ErrorDecoderInterceptor {
    fn name(&self) -> &str {
        "error_decoder"
    }

    async fn intercept(&self, request: Request, next: Next<'_>) -> Result<Response> {
        match next.run(request.clone()).await {
            Ok(response) => match self.decoder.invalid_response(&request, &response) {
                Some(err) => Err(err),
                None => Ok(response),
            },
            Err(Error::Transport(e)) => Err(self.decoder.io_error(&request, e)),
            Err(e) => Err(self.decoder.other_error(&request, e)),
        }
    }
}
