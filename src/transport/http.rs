//! `reqwest`-backed transport.
//!
//! The remote API misbehaves on long-lived connections, so every request is
//! sent with `Connection: close` over a client that keeps no idle sockets.

use std::error::Error as _;
use std::time::Duration;

use reqwest::header::{CONNECTION, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method};

use super::{ApiRequest, ApiResponse, HttpMethod, Transport, TransportError, TransportFuture};

/// Connection settings for [`HttpTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpSettings {
    /// Base endpoint; request paths are appended verbatim.
    pub endpoint: String,
    /// Bearer token; omitted from requests when empty.
    pub token: String,
    /// Upper bound on establishing a connection, including the TLS handshake.
    pub connect_timeout: Duration,
    /// Upper bound on a single request, independent of operation deadlines.
    pub request_timeout: Duration,
}

/// Transport issuing real HTTP requests.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    /// Builds a transport from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be constructed
    /// (for example when the TLS backend fails to initialise).
    pub fn new(settings: &HttpSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .map_err(|err| TransportError::new(describe_error(&err)))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_owned(),
            token: settings.token.trim().to_owned(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a, ApiResponse> {
        Box::pin(async move {
            let method = match request.method {
                HttpMethod::Get => Method::GET,
                HttpMethod::Post => Method::POST,
            };
            let mut builder = self
                .client
                .request(method, self.url_for(&request.path))
                .header(CONNECTION, "close");
            if !self.token.is_empty() {
                builder = builder.bearer_auth(&self.token);
            }
            if let Some(body) = &request.body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            let response = builder
                .send()
                .await
                .map_err(|err| TransportError::new(describe_error(&err)))?;

            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response
                .text()
                .await
                .map_err(|err| TransportError::new(describe_error(&err)))?;

            Ok(ApiResponse {
                status,
                location,
                body,
            })
        })
    }
}

/// Flattens the error source chain so retry classification can match on the
/// root cause (for example `connection refused` buried under hyper).
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if err.is_timeout() && !message.to_ascii_lowercase().contains("timed out") {
        message.push_str(": operation timed out");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> HttpSettings {
        HttpSettings {
            endpoint: endpoint.to_owned(),
            token: String::from(" token "),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn url_joins_endpoint_and_path() {
        let transport = HttpTransport::new(&settings("https://api.example.test/v1/"))
            .expect("client should build");
        assert_eq!(
            transport.url_for("/instances?page=1&size=100"),
            "https://api.example.test/v1/instances?page=1&size=100"
        );
        assert_eq!(transport.token, "token");
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind listener: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("listener addr: {err}"));
        drop(listener);

        let transport = HttpTransport::new(&settings(&format!("http://{addr}")))
            .expect("client should build");
        let request = ApiRequest::get("/instances/abc");
        let err = transport
            .send(&request)
            .await
            .expect_err("closed port should fail");
        assert!(!err.message.is_empty());
    }
}
