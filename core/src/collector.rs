//! Outcome collection and export
//!
//! The collector is the single consumer of the outcome channel. Because one
//! task performs every write, export lines never interleave no matter how
//! many executions complete at once. Each outcome is written as soon as it
//! arrives, so memory use does not grow with run length beyond the latency
//! samples kept for percentiles.

use crate::error::BenchResult;
use crate::rate::RateController;
use crate::report::ReportAggregator;
use crate::response::{ExportRecord, OutcomeRecord};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

type Sink = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// What the collector saw over a run
#[derive(Debug, Clone)]
pub struct CollectorSummary {
    /// Accumulated statistics
    pub aggregator: ReportAggregator,
    /// Outcomes received
    pub completed: usize,
    /// Lines written to the export sink
    pub written: usize,
    /// Arrival time of the last outcome
    pub last_outcome_at: Option<Instant>,
}

/// Receives outcomes, exports them and feeds the rate controller
pub struct Collector {
    outcome_rx: mpsc::Receiver<OutcomeRecord>,
    rate: Arc<RateController>,
    sink: Option<Sink>,
}

impl Collector {
    /// Create a collector without an export sink
    pub fn new(outcome_rx: mpsc::Receiver<OutcomeRecord>, rate: Arc<RateController>) -> Self {
        Self {
            outcome_rx,
            rate,
            sink: None,
        }
    }

    /// Export every outcome to `writer` as JSON Lines
    pub fn with_sink<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.sink = Some(BufWriter::new(Box::new(writer)));
        self
    }

    /// Create (or truncate) the export file at `path`
    pub async fn with_file(self, path: &Path) -> BenchResult<Self> {
        let file = tokio::fs::File::create(path).await?;
        tracing::debug!(path = %path.display(), "Exporting outcomes");
        Ok(self.with_sink(file))
    }

    /// Consume outcomes until every sender is gone
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails. The receiver is dropped
    /// with it, so outstanding executions discard their outcomes.
    pub async fn run(mut self) -> BenchResult<CollectorSummary> {
        let mut summary = CollectorSummary {
            aggregator: ReportAggregator::new(),
            completed: 0,
            written: 0,
            last_outcome_at: None,
        };

        while let Some(record) = self.outcome_rx.recv().await {
            summary.last_outcome_at = Some(Instant::now());
            summary.completed += 1;

            if let Some(adjustment) = self.rate.record_outcome(record.outcome.is_success()) {
                tracing::debug!(
                    from = adjustment.from,
                    to = adjustment.to,
                    success_ratio = adjustment.success_ratio,
                    "Adjusted emission rate"
                );
            }

            summary.aggregator.record(&record.outcome);

            if let Some(sink) = self.sink.as_mut() {
                let mut line = serde_json::to_vec(&ExportRecord::from(&record))?;
                line.push(b'\n');
                sink.write_all(&line).await?;
                summary.written += 1;
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.flush().await?;
        }

        tracing::debug!(
            completed = summary.completed,
            written = summary.written,
            "Collector finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("rate", &self.rate)
            .field("export", &self.sink.is_some())
            .finish()
    }
}
