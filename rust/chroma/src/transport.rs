//! Abstract request transport used by the client and collection handles.
//!
//! The crate never opens connections itself. Callers plug in a [`Transport`] that issues
//! the request against a Chroma server (adding authentication, retries and so on) and
//! hands back the parsed JSON body.

use chroma_error::{ChromaError, ErrorCodes};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

/// A single request against the Chroma HTTP API.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    /// Logical operation name, used for logging and metrics (e.g. `create_collection`).
    pub operation: String,
    /// HTTP method.
    pub method: Method,
    /// Path relative to the server root, e.g. `/api/v2/tenants/t/databases/d/collections`.
    pub path: String,
    /// JSON body, if the request carries one.
    pub body: Option<Value>,
}

impl TransportRequest {
    /// Creates a request without a body.
    pub fn new(operation: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        TransportRequest {
            operation: operation.into(),
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Failures reported by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        /// Operation that failed.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Error message returned by the server.
        message: String,
    },
    /// The request could not be completed.
    #[error("{operation} failed: {source}")]
    Request {
        /// Operation that failed.
        operation: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ChromaError for TransportError {
    fn code(&self) -> ErrorCodes {
        match self {
            TransportError::Status { status, .. } => match status {
                400 | 422 => ErrorCodes::InvalidArgument,
                404 => ErrorCodes::NotFound,
                409 | 412 => ErrorCodes::FailedPrecondition,
                500..=599 => ErrorCodes::Internal,
                _ => ErrorCodes::Unknown,
            },
            TransportError::Request { .. } => ErrorCodes::Unavailable,
        }
    }
}

/// Issues requests against a Chroma server and returns the parsed JSON response.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and returns the decoded response body.
    ///
    /// An empty response body is reported as an empty JSON object.
    async fn send(&self, request: TransportRequest) -> Result<Value, TransportError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<Value, TransportError> {
        (**self).send(request).await
    }
}
