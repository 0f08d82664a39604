//! Transport capability trait
//!
//! The engine never talks HTTP itself. Implementations live in the transport
//! crate (or in tests); the dispatcher only needs a complete response or a
//! classified error from them.

use crate::error::FailureKind;
use crate::request::Request;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// A fully consumed response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (multi-valued headers joined with `", "`)
    pub headers: BTreeMap<String, String>,
    /// Complete body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }
}

/// Executes requests against the target system
///
/// `execute` resolves only once the whole response has been consumed, which
/// makes streaming responses (SSE, chunked) look like any other response to
/// the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier (e.g., "http")
    fn name(&self) -> &str;

    /// Send the request and read the complete response
    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError>;
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Response did not complete in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection reset or other I/O failure
    #[error("transport failure: {0}")]
    Io(String),

    /// Malformed response, or a request the transport cannot encode
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Convert to FailureKind for outcome classification
    pub fn to_failure_kind(&self) -> FailureKind {
        match self {
            TransportError::Connect(_) => FailureKind::ConnectError,
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Io(_) => FailureKind::TransportError,
            TransportError::Protocol(_) => FailureKind::ProtocolError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_to_failure_kind() {
        assert_eq!(
            TransportError::Connect("refused".into()).to_failure_kind(),
            FailureKind::ConnectError
        );
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(1)).to_failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            TransportError::Io("reset".into()).to_failure_kind(),
            FailureKind::TransportError
        );
        assert_eq!(
            TransportError::Protocol("bad header".into()).to_failure_kind(),
            FailureKind::ProtocolError
        );
    }

    #[test]
    fn test_transport_response_new() {
        let response = TransportResponse::new(204, Vec::new());
        assert_eq!(response.status, 204);
        assert!(response.headers.is_empty());
    }
}
