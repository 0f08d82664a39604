//! reqwest-backed transport

use std::collections::BTreeMap;

use futures::StreamExt;
use qpsbench_core::{Request, Transport, TransportError, TransportResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use crate::config::HttpTransportConfig;

/// HTTP/1.1 and HTTP/2 transport with connection pooling.
///
/// `execute` reads the response body to the end, so chunked and
/// event-stream responses complete only when the server closes the stream.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// The underlying reqwest client
    client: Client,

    /// Configuration used to create this transport
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if let Some(keepalive) = config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Protocol(format!("failed to build client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a transport with default configuration.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(HttpTransportConfig::default())
    }

    /// Get the configuration for this transport.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn build_request(&self, request: &Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::Protocol(format!("invalid method `{}`", request.method)))?;

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::Protocol(format!("invalid header name `{name}`")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::Protocol(format!("invalid value for header `{name}`")))?;
            headers.append(name, value);
        }

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .timeout(request.timeout);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(|e| classify(e, request))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify(e, request))?;
            body.extend_from_slice(&chunk);
        }

        tracing::trace!(
            url = %request.url,
            status,
            bytes = body.len(),
            "Response consumed"
        );

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest error onto the transport taxonomy
fn classify(error: reqwest::Error, request: &Request) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(request.timeout)
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else if error.is_builder() || error.is_body() || error.is_decode() {
        TransportError::Protocol(error.to_string())
    } else {
        TransportError::Io(error.to_string())
    }
}

/// Flatten headers; repeated names are joined with `", "`
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    collected
}
