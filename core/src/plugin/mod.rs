//! Request/response plugin hooks
//!
//! A run has at most one plugin. Its `handle_request` hook sees each request
//! before it is sent and its `handle_response` hook sees each outcome before
//! it reaches the collector. Hooks receive borrowed or owned values and return
//! new ones, so a plugin can never mutate shared workload state.
//!
//! A failing or panicking hook turns that one request into a
//! [`FailureKind::PluginError`](crate::error::FailureKind) outcome; dispatch
//! continues.

mod rules;

pub use rules::{RulePlugin, RequestRules, ResponseRules, UrlRewrite};

use crate::error::{BenchError, BenchResult};
use crate::request::Request;
use crate::response::Outcome;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Hook identifier used in errors and logs
pub const HANDLE_REQUEST: &str = "handle_request";

/// Hook identifier used in errors and logs
pub const HANDLE_RESPONSE: &str = "handle_response";

/// A per-request hook failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The hook returned an error
    #[error("plugin hook {hook} failed: {message}")]
    Hook {
        /// Which hook failed
        hook: &'static str,
        /// What the hook reported
        message: String,
    },

    /// The hook panicked
    #[error("plugin hook {hook} panicked: {message}")]
    Panic {
        /// Which hook panicked
        hook: &'static str,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl PluginError {
    /// Create a hook error
    pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
        PluginError::Hook {
            hook,
            message: message.into(),
        }
    }
}

/// User extension invoked around every request
///
/// Both hooks are optional; the defaults pass values through unchanged.
/// Implementations must be callable from many tasks at once.
pub trait Plugin: Send + Sync {
    /// Plugin identifier for logs
    fn name(&self) -> &str;

    /// Return the request to send in place of `request`
    fn handle_request(&self, request: &Request) -> Result<Request, PluginError> {
        Ok(request.clone())
    }

    /// Return the outcome to record in place of `outcome`
    fn handle_response(&self, outcome: Outcome) -> Result<Outcome, PluginError> {
        Ok(outcome)
    }
}

/// Holds the run's plugin, if any, and isolates its failures
#[derive(Clone, Default)]
pub struct PluginHost {
    plugin: Option<Arc<dyn Plugin>>,
}

impl PluginHost {
    /// A host with no plugin; both hooks are identities
    pub fn none() -> Self {
        Self { plugin: None }
    }

    /// Wrap an already constructed plugin
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin: Some(plugin),
        }
    }

    /// Load a rule plugin from `path`
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Plugin`] if the file is missing or malformed.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let plugin = RulePlugin::from_path(path)?;
        if !plugin.has_hooks() {
            tracing::warn!(
                path = %path.display(),
                plugin = plugin.name(),
                "Plugin defines neither handle_request nor handle_response"
            );
        }
        tracing::info!(path = %path.display(), plugin = plugin.name(), "Loaded plugin");
        Ok(Self::new(Arc::new(plugin)))
    }

    /// Load from `path` if one is given
    pub fn load_optional(path: Option<&Path>) -> BenchResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::none()),
        }
    }

    /// Whether a plugin is installed
    pub fn is_active(&self) -> bool {
        self.plugin.is_some()
    }

    /// Run the request hook
    pub fn handle_request(&self, request: &Request) -> Result<Request, PluginError> {
        match &self.plugin {
            None => Ok(request.clone()),
            Some(plugin) => guarded(HANDLE_REQUEST, || plugin.handle_request(request)),
        }
    }

    /// Run the response hook
    pub fn handle_response(&self, outcome: Outcome) -> Result<Outcome, PluginError> {
        match &self.plugin {
            None => Ok(outcome),
            Some(plugin) => guarded(HANDLE_RESPONSE, || plugin.handle_response(outcome)),
        }
    }
}

fn guarded<T>(
    hook: &'static str,
    f: impl FnOnce() -> Result<T, PluginError>,
) -> Result<T, PluginError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(PluginError::Panic { hook, message })
    })
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugin", &self.plugin.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl From<PluginError> for BenchError {
    fn from(err: PluginError) -> Self {
        BenchError::Plugin(err.to_string())
    }
}
