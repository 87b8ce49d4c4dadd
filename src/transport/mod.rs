//! Single-attempt HTTP transport against the remote wizard API.
//!
//! A [`Transport`] performs exactly one request and reports either the raw
//! response (any status) or a network-level [`TransportError`]. Retries,
//! status classification, and JSON decoding live above this seam so tests can
//! substitute a scripted transport.

mod http;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

pub use http::{HttpSettings, HttpTransport};

/// Future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Network-level failure before any HTTP status was received.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    /// Description of the failure, including the underlying cause chain.
    pub message: String,
}

impl TransportError {
    /// Builds an error from any displayable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// HTTP methods used by the wizard protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One request against the remote API. The body is held as serialized bytes
/// so every attempt replays an identical payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the configured endpoint, including any query string.
    pub path: String,
    /// Serialized JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Builds a body-less `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    /// Builds a `POST` request carrying `payload` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when `payload` cannot be encoded.
    pub fn post_json<B: Serialize + ?Sized>(
        path: impl Into<String>,
        payload: &B,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(serde_json::to_vec(payload)?),
        })
    }

    /// Decodes the body as JSON, mainly for assertions and logging.
    #[must_use]
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }
}

/// Raw response from one attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Location` header value, if present.
    pub location: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl ApiResponse {
    /// Reports whether the status is below 400.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Reports whether the status is a server error.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }
}

/// Sends requests to the remote API, one attempt per call.
pub trait Transport: Send + Sync {
    /// Performs a single attempt of `request`.
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a, ApiResponse>;
}

/// Strips the `./` prefix the remote side uses in `Location` headers.
///
/// ```
/// use nubes_lifecycle::transport::strip_location_prefix;
/// assert_eq!(strip_location_prefix("./8f1c"), "8f1c");
/// assert_eq!(strip_location_prefix("8f1c"), "8f1c");
/// ```
#[must_use]
pub fn strip_location_prefix(location: &str) -> &str {
    let trimmed = location.trim();
    trimmed.strip_prefix("./").unwrap_or(trimmed)
}
