//! Error types for qpsbench-core
//!
//! Two families live here. [`BenchError`] covers everything that stops a run
//! (bad configuration, unloadable plugins, invariant violations). [`FailureKind`]
//! classifies per-request failures, which are recorded as data and never
//! interrupt dispatch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a request that did not complete at the transport level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Could not establish a connection
    ConnectError,
    /// No complete response within the request timeout
    Timeout,
    /// Connection reset or other I/O failure mid-request
    TransportError,
    /// Malformed response or request that the transport could not encode
    ProtocolError,
    /// A plugin hook failed for this request
    PluginError,
}

impl FailureKind {
    /// Stable identifier used in exports and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConnectError => "connect_error",
            FailureKind::Timeout => "timeout",
            FailureKind::TransportError => "transport_error",
            FailureKind::ProtocolError => "protocol_error",
            FailureKind::PluginError => "plugin_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal engine error
///
/// Any of these aborts the run. Configuration, workload and plugin-load errors
/// are raised before the first request is dispatched.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A workload record could not be turned into a request
    #[error("configuration error: workload record {index}: {message}")]
    Workload {
        /// Zero-based index of the offending record
        index: usize,
        /// What was wrong with it
        message: String,
    },

    /// Plugin could not be loaded
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Engine invariant violated
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Config(message.into())
    }

    /// Create a configuration error for a component the builder never received
    pub fn missing_config(component: &str) -> Self {
        BenchError::Config(format!("missing required component: {component}"))
    }

    /// Create a workload error for the record at `index`
    pub fn workload(index: usize, message: impl Into<String>) -> Self {
        BenchError::Workload {
            index,
            message: message.into(),
        }
    }

    /// Create a plugin load error
    pub fn plugin(message: impl Into<String>) -> Self {
        BenchError::Plugin(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        BenchError::Internal(message.into())
    }

    /// Whether this error was raised by configuration or workload validation
    pub fn is_config(&self) -> bool {
        matches!(self, BenchError::Config(_) | BenchError::Workload { .. })
    }
}

impl From<crate::config::ConfigError> for BenchError {
    fn from(err: crate::config::ConfigError) -> Self {
        BenchError::Config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
