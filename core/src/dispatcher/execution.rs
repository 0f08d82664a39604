//! Single request execution

use crate::error::FailureKind;
use crate::plugin::PluginHost;
use crate::request::{Request, RequestId};
use crate::response::{Outcome, OutcomeRecord};
use crate::traits::Transport;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Everything one spawned execution owns
pub(crate) struct Execution {
    pub(crate) id: RequestId,
    pub(crate) iteration: usize,
    pub(crate) index: usize,
    pub(crate) workload: Arc<[Request]>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) plugins: PluginHost,
    pub(crate) outcome_tx: mpsc::Sender<OutcomeRecord>,
}

impl Execution {
    /// Execute the request and hand its outcome to the collector
    pub(crate) async fn run(self) {
        let request = &self.workload[self.index];
        let outcome = self.execute(request).await;
        let record = OutcomeRecord::new(self.id, self.iteration, self.index, request, outcome);

        if self.outcome_tx.send(record).await.is_err() {
            tracing::debug!(
                request_id = %self.id,
                "Outcome channel closed, discarding outcome"
            );
        }
    }

    /// hook -> transport (under the request timeout) -> hook
    pub(crate) async fn execute(&self, request: &Request) -> Outcome {
        let prepared = match self.plugins.handle_request(request) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!(request_id = %self.id, error = %e, "Plugin rejected request");
                return Outcome::failure(FailureKind::PluginError, e.to_string(), Duration::ZERO);
            }
        };

        let start = Instant::now();
        let outcome =
            match tokio::time::timeout(prepared.timeout, self.transport.execute(&prepared)).await {
                Ok(Ok(response)) => Outcome::success(
                    response.status,
                    response.headers,
                    response.body,
                    start.elapsed(),
                ),
                Ok(Err(e)) => Outcome::failure(e.to_failure_kind(), e.to_string(), start.elapsed()),
                Err(_) => Outcome::failure(
                    FailureKind::Timeout,
                    format!("no complete response within {:?}", prepared.timeout),
                    start.elapsed(),
                ),
            };

        tracing::trace!(
            request_id = %self.id,
            url = %prepared.url,
            success = outcome.is_success(),
            latency_ms = outcome.latency().as_secs_f64() * 1000.0,
            "Request completed"
        );

        let latency = outcome.latency();
        match self.plugins.handle_response(outcome) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(request_id = %self.id, error = %e, "Plugin rejected response");
                Outcome::failure(FailureKind::PluginError, e.to_string(), latency)
            }
        }
    }
}
