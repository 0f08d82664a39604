//! Report aggregation and percentile calculation
//!
//! Latencies are kept exactly (one `f64` per outcome, in seconds) and
//! percentiles use the nearest-rank rule: for `n` sorted samples the pN value
//! is `sorted[ceil(N / 100 × n) − 1]`. Every reported percentile is therefore
//! an observed latency.

use crate::error::{BenchError, BenchResult, FailureKind};
use crate::response::{ExportRecord, Outcome};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::time::Duration;

/// Latency summary in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct LatencySummary {
    /// Arithmetic mean
    pub average: f64,
    /// Median
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Smallest latency
    pub min: f64,
    /// Largest latency
    pub max: f64,
}

impl LatencySummary {
    /// Summarize a slice of latencies; all zeros when empty
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let len = sorted.len();

        Self {
            average: sorted.iter().sum::<f64>() / len as f64,
            p50: nearest_rank(&sorted, 50.0),
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
            min: sorted[0],
            max: sorted[len - 1],
        }
    }
}

/// Nearest-rank percentile over sorted values
pub fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Final statistics of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    /// Outcomes recorded
    pub total_requests: usize,
    /// Outcomes where the transport completed
    pub successful_requests: usize,
    /// Outcomes that did not complete
    pub failed_requests: usize,
    /// `successful_requests / total_requests` (0 when empty)
    pub success_rate: f64,
    /// Wall time in seconds from dispatch start to the last outcome
    pub total_time: f64,
    /// Achieved throughput, `total_requests / total_time`
    pub qps: f64,
    /// Latency statistics over every outcome, failures included
    pub response_times: LatencySummary,
    /// Status code histogram of successful outcomes
    pub status_codes: BTreeMap<u16, usize>,
    /// Failure counts by kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_kinds: BTreeMap<String, usize>,
    /// Whether the run was cut short
    #[serde(default)]
    pub cancelled: bool,
}

/// Accumulates outcomes into a [`Report`]
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    successes: usize,
    failures: usize,
    latencies: Vec<f64>,
    status_codes: BTreeMap<u16, usize>,
    failure_kinds: BTreeMap<FailureKind, usize>,
}

impl ReportAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outcomes recorded so far
    pub fn len(&self) -> usize {
        self.successes + self.failures
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one outcome
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success { status, .. } => self.record_success(*status),
            Outcome::Failure { kind, .. } => self.record_failure(*kind),
        }
        self.latencies.push(outcome.latency().as_secs_f64());
    }

    /// Record one line of an export file
    pub fn record_export(&mut self, record: &ExportRecord) {
        match (record.kind, record.status) {
            (Some(kind), _) => self.record_failure(kind),
            (None, Some(status)) => self.record_success(status),
            // Success without a status cannot be produced by the exporter
            (None, None) => self.successes += 1,
        }
        self.latencies.push(record.latency);
    }

    fn record_success(&mut self, status: u16) {
        self.successes += 1;
        *self.status_codes.entry(status).or_default() += 1;
    }

    fn record_failure(&mut self, kind: FailureKind) {
        self.failures += 1;
        *self.failure_kinds.entry(kind).or_default() += 1;
    }

    /// Build the report for a run that took `elapsed`
    pub fn finish(&self, elapsed: Duration, cancelled: bool) -> Report {
        let total = self.len();
        let secs = elapsed.as_secs_f64();
        Report {
            total_requests: total,
            successful_requests: self.successes,
            failed_requests: self.failures,
            success_rate: if total > 0 {
                self.successes as f64 / total as f64
            } else {
                0.0
            },
            total_time: secs,
            qps: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            response_times: LatencySummary::from_values(&self.latencies),
            status_codes: self.status_codes.clone(),
            failure_kinds: self
                .failure_kinds
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect(),
            cancelled,
        }
    }

    /// Rebuild a report from an export file
    ///
    /// Dispatch start is not exported, so the window runs from the earliest
    /// `timestamp − latency` to the latest `timestamp`.
    pub fn from_export_reader<R: BufRead>(reader: R) -> BenchResult<Report> {
        let mut aggregator = Self::new();
        let mut window: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
            None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ExportRecord = serde_json::from_str(&line).map_err(|e| {
                BenchError::config(format!("export line {}: {e}", line_no + 1))
            })?;

            let sent_at = Duration::try_from_secs_f64(record.latency)
                .ok()
                .and_then(|latency| chrono::Duration::from_std(latency).ok())
                .and_then(|latency| record.timestamp.checked_sub_signed(latency))
                .ok_or_else(|| {
                    BenchError::config(format!(
                        "export line {}: latency {} is out of range",
                        line_no + 1,
                        record.latency
                    ))
                })?;
            window = Some(match window {
                None => (sent_at, record.timestamp),
                Some((first, last)) => (first.min(sent_at), last.max(record.timestamp)),
            });
            aggregator.record_export(&record);
        }

        let elapsed = window
            .and_then(|(first, last)| (last - first).to_std().ok())
            .unwrap_or(Duration::ZERO);
        Ok(aggregator.finish(elapsed, false))
    }
}
