//! Workload ingestion
//!
//! A workload is a JSON Lines document with one request record per line:
//!
//! ```text
//! {"url": "http://localhost:8080/", "method": "POST", "headers": {"x-id": "1"}, "body": {"k": 1}, "timeout": 2.5}
//! ```
//!
//! Only `url` is required. A string `body` is sent verbatim; any other JSON
//! value is sent serialized. `timeout` is in seconds.

use crate::config::positive_secs;
use crate::error::{BenchError, BenchResult};
use crate::request::{is_valid_method, Request, DEFAULT_METHOD};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WorkloadRecord {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default)]
    timeout: Option<f64>,
}

/// Parses workload records into requests
#[derive(Debug, Clone)]
pub struct WorkloadLoader {
    default_timeout: Duration,
}

impl WorkloadLoader {
    /// Create a loader that applies `default_timeout` to records without one
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Convert a sequence of records into requests, preserving order
    pub fn load_records<I>(&self, records: I) -> BenchResult<Vec<Request>>
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| self.parse_record(index, record))
            .collect()
    }

    /// Parse JSON Lines text, skipping blank lines
    pub fn load_str(&self, text: &str) -> BenchResult<Vec<Request>> {
        self.load_reader(text.as_bytes())
    }

    /// Parse JSON Lines from a reader, skipping blank lines
    pub fn load_reader<R: BufRead>(&self, reader: R) -> BenchResult<Vec<Request>> {
        let mut requests = Vec::new();
        for line in reader.split(b'\n') {
            let line = line?;
            let index = requests.len();
            let line = std::str::from_utf8(&line)
                .map_err(|e| BenchError::workload(index, format!("invalid UTF-8: {e}")))?
                .trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| BenchError::workload(index, format!("invalid JSON: {e}")))?;
            requests.push(self.parse_record(index, value)?);
        }
        Ok(requests)
    }

    /// Read and parse a workload file
    pub fn load_path(&self, path: &Path) -> BenchResult<Vec<Request>> {
        let file = std::fs::File::open(path).map_err(|e| {
            BenchError::config(format!(
                "failed to open workload '{}': {e}",
                path.display()
            ))
        })?;
        let requests = self.load_reader(std::io::BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            requests = requests.len(),
            "Loaded workload"
        );
        Ok(requests)
    }

    /// Convert one record; `index` names it in errors
    pub fn parse_record(&self, index: usize, record: serde_json::Value) -> BenchResult<Request> {
        if !record.is_object() {
            return Err(BenchError::workload(index, "expected a JSON object"));
        }

        let record: WorkloadRecord = serde_json::from_value(record)
            .map_err(|e| BenchError::workload(index, e.to_string()))?;

        let url = match record.url {
            Some(url) if !url.trim().is_empty() => url,
            Some(_) => return Err(BenchError::workload(index, "field `url` is empty")),
            None => return Err(BenchError::workload(index, "missing required field `url`")),
        };

        let method = record
            .method
            .unwrap_or_else(|| DEFAULT_METHOD.to_string())
            .to_ascii_uppercase();
        if !is_valid_method(&method) {
            return Err(BenchError::workload(
                index,
                format!("invalid method `{method}`"),
            ));
        }

        let timeout = match record.timeout {
            None => self.default_timeout,
            Some(secs) => positive_secs(secs).ok_or_else(|| {
                BenchError::workload(
                    index,
                    format!("timeout must be a positive number of seconds, got {secs}"),
                )
            })?,
        };

        let body = match record.body {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(text)) => Some(text.into_bytes()),
            Some(value) => Some(serde_json::to_vec(&value)?),
        };

        Ok(Request {
            url,
            method,
            headers: record.headers.unwrap_or_default(),
            body,
            timeout,
        })
    }
}

impl Default for WorkloadLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs_f64(crate::config::DEFAULT_TIMEOUT_SECS))
    }
}
