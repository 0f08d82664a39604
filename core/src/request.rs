//! Request types for dispatch

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP method used when a workload record does not name one
pub const DEFAULT_METHOD: &str = "GET";

/// Submission sequence number of a dispatched request
///
/// Assigned in workload iteration order, so `iteration * workload_len + index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single request of the workload
///
/// Requests are immutable once loaded. Plugins receive a shared reference and
/// return a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target URL
    pub url: String,
    /// Upper-case HTTP method
    pub method: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Optional opaque payload
    pub body: Option<Vec<u8>>,
    /// Time allowed for the full response to arrive
    pub timeout: Duration,
}

impl Request {
    /// Create a GET request
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: DEFAULT_METHOD.to_string(),
            headers: BTreeMap::new(),
            body: None,
            timeout,
        }
    }

    /// Set the method (normalized to upper case)
    pub fn with_method(mut self, method: impl AsRef<str>) -> Self {
        self.method = method.as_ref().to_ascii_uppercase();
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the payload
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Check that `method` is a plausible HTTP method token
pub(crate) fn is_valid_method(method: &str) -> bool {
    !method.is_empty() && method.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = Request::new("http://localhost/", Duration::from_secs(30));
        assert_eq!(request.method, "GET");
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_builder_normalizes_method() {
        let request = Request::new("http://localhost/", Duration::from_secs(1))
            .with_method("post")
            .with_header("Content-Type", "application/json")
            .with_body("{}");
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.body.as_deref(), Some(b"{}".as_slice()));
    }

    #[test]
    fn test_request_id_from_u64() {
        let id: RequestId = 42u64.into();
        assert_eq!(id.0, 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_method_validation() {
        assert!(is_valid_method("GET"));
        assert!(is_valid_method("M-SEARCH"));
        assert!(!is_valid_method(""));
        assert!(!is_valid_method("GET /"));
    }
}
