//! Declarative rule plugin
//!
//! Rules are read from a JSON file:
//!
//! ```text
//! {
//!   "name": "staging-rewrite",
//!   "handle_request": {
//!     "set_headers": {"authorization": "Bearer test"},
//!     "replace_url": {"from": "prod.internal", "to": "staging.internal"}
//!   },
//!   "handle_response": {"redact_body": true}
//! }
//! ```

use super::{Plugin, PluginError, HANDLE_REQUEST};
use crate::config::positive_secs;
use crate::error::{BenchError, BenchResult};
use crate::request::{is_valid_method, Request};
use crate::response::Outcome;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Substring replacement applied to request URLs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlRewrite {
    /// Text to find
    pub from: String,
    /// Replacement
    pub to: String,
}

/// Rewrites applied by `handle_request`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestRules {
    /// Headers to add or overwrite
    pub set_headers: BTreeMap<String, String>,
    /// Headers to remove (case-insensitive)
    pub remove_headers: Vec<String>,
    /// Replacement method
    pub method: Option<String>,
    /// URL substring rewrite
    pub replace_url: Option<UrlRewrite>,
    /// Replacement body
    pub body: Option<String>,
    /// Replacement timeout in seconds
    pub timeout: Option<f64>,
}

/// Rewrites applied by `handle_response`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseRules {
    /// Response headers to drop before export (case-insensitive)
    pub drop_headers: Vec<String>,
    /// Replace the response body with an empty one
    pub redact_body: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    handle_request: Option<RequestRules>,
    #[serde(default)]
    handle_response: Option<ResponseRules>,
}

/// Plugin driven by a JSON rule file
#[derive(Debug, Clone)]
pub struct RulePlugin {
    name: String,
    request: Option<RequestRules>,
    response: Option<ResponseRules>,
}

impl RulePlugin {
    /// Build a plugin from rule sets
    pub fn new(
        name: impl Into<String>,
        request: Option<RequestRules>,
        response: Option<ResponseRules>,
    ) -> Self {
        Self {
            name: name.into(),
            request,
            response,
        }
    }

    /// Parse rules from JSON text
    pub fn from_json(text: &str) -> BenchResult<Self> {
        let file: RuleFile = serde_json::from_str(text)
            .map_err(|e| BenchError::plugin(format!("invalid rule file: {e}")))?;

        if let Some(rules) = &file.handle_request {
            if let Some(method) = &rules.method {
                if !is_valid_method(&method.to_ascii_uppercase()) {
                    return Err(BenchError::plugin(format!("invalid method `{method}`")));
                }
            }
            if let Some(timeout) = rules.timeout {
                if positive_secs(timeout).is_none() {
                    return Err(BenchError::plugin(format!(
                        "timeout must be positive, got {timeout}"
                    )));
                }
            }
        }

        Ok(Self::new(
            file.name.unwrap_or_else(|| "rules".to_string()),
            file.handle_request,
            file.handle_response,
        ))
    }

    /// Read rules from a file
    pub fn from_path(path: &Path) -> BenchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BenchError::plugin(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Whether either hook is defined
    pub fn has_hooks(&self) -> bool {
        self.request.is_some() || self.response.is_some()
    }
}

impl Plugin for RulePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_request(&self, request: &Request) -> Result<Request, PluginError> {
        let Some(rules) = &self.request else {
            return Ok(request.clone());
        };

        let mut next = request.clone();
        next.headers
            .retain(|name, _| !contains_ignore_case(&rules.remove_headers, name));
        for (name, value) in &rules.set_headers {
            next.headers.insert(name.clone(), value.clone());
        }
        if let Some(method) = &rules.method {
            next.method = method.to_ascii_uppercase();
        }
        if let Some(rewrite) = &rules.replace_url {
            next.url = next.url.replace(&rewrite.from, &rewrite.to);
            if next.url.is_empty() {
                return Err(PluginError::hook(HANDLE_REQUEST, "rewritten url is empty"));
            }
        }
        if let Some(body) = &rules.body {
            next.body = Some(body.clone().into_bytes());
        }
        if let Some(secs) = rules.timeout {
            next.timeout = positive_secs(secs).ok_or_else(|| {
                PluginError::hook(HANDLE_REQUEST, format!("invalid timeout {secs}"))
            })?;
        }
        Ok(next)
    }

    fn handle_response(&self, outcome: Outcome) -> Result<Outcome, PluginError> {
        let Some(rules) = &self.response else {
            return Ok(outcome);
        };

        match outcome {
            Outcome::Success {
                status,
                mut headers,
                body,
                latency,
            } => {
                headers.retain(|name, _| !contains_ignore_case(&rules.drop_headers, name));
                let body = if rules.redact_body { Vec::new() } else { body };
                Ok(Outcome::success(status, headers, body, latency))
            }
            failure => Ok(failure),
        }
    }
}

fn contains_ignore_case(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}
