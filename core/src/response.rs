//! Outcome types and the export record shape

pub use crate::error::FailureKind;

use crate::request::{Request, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of dispatching one request
///
/// Any received response is a `Success`, whatever its status code. `Failure`
/// is reserved for requests that never produced a complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The transport delivered a complete response
    Success {
        /// HTTP status code
        status: u16,
        /// Response headers
        headers: BTreeMap<String, String>,
        /// Fully consumed response body
        body: Vec<u8>,
        /// Time from send to last body byte
        latency: Duration,
    },
    /// The request did not complete
    Failure {
        /// Cause classification
        kind: FailureKind,
        /// Human-readable cause
        message: String,
        /// Time from send to failure
        latency: Duration,
    },
}

impl Outcome {
    /// Create a success outcome
    pub fn success(
        status: u16,
        headers: BTreeMap<String, String>,
        body: Vec<u8>,
        latency: Duration,
    ) -> Self {
        Outcome::Success {
            status,
            headers,
            body,
            latency,
        }
    }

    /// Create a failure outcome
    pub fn failure(kind: FailureKind, message: impl Into<String>, latency: Duration) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
            latency,
        }
    }

    /// Check if the transport completed
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Latency to completion or to failure
    pub fn latency(&self) -> Duration {
        match self {
            Outcome::Success { latency, .. } | Outcome::Failure { latency, .. } => *latency,
        }
    }

    /// Status code of a success
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success { status, .. } => Some(*status),
            Outcome::Failure { .. } => None,
        }
    }

    /// Failure classification
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// An outcome tagged with the request instance that produced it
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    /// Submission sequence number
    pub request_id: RequestId,
    /// Which pass over the workload
    pub iteration: usize,
    /// Position of the request in the workload
    pub index: usize,
    /// Method of the workload request
    pub method: String,
    /// URL of the workload request
    pub url: String,
    /// What happened
    pub outcome: Outcome,
    /// When the outcome was produced
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl OutcomeRecord {
    /// Tag `outcome` with the identity of `request`
    pub fn new(
        request_id: RequestId,
        iteration: usize,
        index: usize,
        request: &Request,
        outcome: Outcome,
    ) -> Self {
        Self {
            request_id,
            iteration,
            index,
            method: request.method.clone(),
            url: request.url.clone(),
            outcome,
            completed_at: chrono::Utc::now(),
        }
    }
}

/// One line of the response export file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Status code, null on failure
    pub status: Option<u16>,
    /// Response headers, empty on failure
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body (lossy UTF-8), null on failure
    pub body: Option<String>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Latency in seconds
    pub latency: f64,
    /// Submission sequence number
    pub request_id: RequestId,
    /// Which pass over the workload
    pub iteration: usize,
    /// Position of the request in the workload
    pub index: usize,
    /// Method of the workload request
    pub method: String,
    /// URL of the workload request
    pub url: String,
    /// When the outcome was produced
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExportRecord {
    /// Whether the exported outcome was a success
    pub fn is_success(&self) -> bool {
        self.kind.is_none()
    }
}

impl From<&OutcomeRecord> for ExportRecord {
    fn from(record: &OutcomeRecord) -> Self {
        let (status, headers, body, error, kind) = match &record.outcome {
            Outcome::Success {
                status,
                headers,
                body,
                ..
            } => (
                Some(*status),
                headers.clone(),
                Some(String::from_utf8_lossy(body).into_owned()),
                None,
                None,
            ),
            Outcome::Failure { kind, message, .. } => (
                None,
                BTreeMap::new(),
                None,
                Some(message.clone()),
                Some(*kind),
            ),
        };

        Self {
            status,
            headers,
            body,
            error,
            kind,
            latency: record.outcome.latency().as_secs_f64(),
            request_id: record.request_id,
            iteration: record.iteration,
            index: record.index,
            method: record.method.clone(),
            url: record.url.clone(),
            timestamp: record.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: Outcome) -> OutcomeRecord {
        let request = Request::new("http://localhost/a", Duration::from_secs(1));
        OutcomeRecord::new(RequestId(7), 1, 0, &request, outcome)
    }

    #[test]
    fn test_server_error_status_is_success() {
        let outcome = Outcome::success(503, BTreeMap::new(), Vec::new(), Duration::ZERO);
        assert!(outcome.is_success());
        assert_eq!(outcome.status(), Some(503));
        assert!(outcome.failure_kind().is_none());
    }

    #[test]
    fn test_failure_accessors() {
        let outcome = Outcome::failure(
            FailureKind::Timeout,
            "timed out",
            Duration::from_millis(250),
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.status(), None);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(outcome.latency(), Duration::from_millis(250));
    }

    #[test]
    fn test_export_success_shape() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        let export = ExportRecord::from(&record(Outcome::success(
            200,
            headers,
            b"hello".to_vec(),
            Duration::from_millis(1500),
        )));

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["body"], "hello");
        assert_eq!(json["headers"]["content-type"], "text/plain");
        assert_eq!(json["latency"], 1.5);
        assert!(json.get("error").is_none());
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_export_failure_shape() {
        let export = ExportRecord::from(&record(Outcome::failure(
            FailureKind::ConnectError,
            "connection refused",
            Duration::from_millis(5),
        )));
        assert!(!export.is_success());

        let json = serde_json::to_value(&export).unwrap();
        assert!(json["status"].is_null());
        assert!(json["body"].is_null());
        assert_eq!(json["error"], "connection refused");
        assert_eq!(json["kind"], "connect_error");
        assert_eq!(json["request_id"], 7);
    }

    #[test]
    fn test_export_line_parses_back() {
        let export = ExportRecord::from(&record(Outcome::failure(
            FailureKind::Timeout,
            "slow",
            Duration::from_secs(2),
        )));
        let line = serde_json::to_string(&export).unwrap();
        let parsed: ExportRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, export);
    }
}
