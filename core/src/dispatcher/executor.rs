//! Dispatcher scheduling loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::config::DispatchConfig;
use crate::error::{BenchError, BenchResult};
use crate::plugin::PluginHost;
use crate::rate::RateController;
use crate::request::{Request, RequestId};
use crate::response::OutcomeRecord;
use crate::traits::Transport;

use super::cancel::CancelHandle;
use super::execution::Execution;
use super::state::DispatchState;
use super::stats::{DispatchSummary, InFlightGauge};

/// Dispatcher drives a run from submission to drain
///
/// A single scheduling loop paces submissions through the [`RateController`]
/// and admits each request through a counting semaphore sized to the
/// in-flight cap. Executions run as tokio tasks and deliver outcomes over an
/// mpsc channel.
pub struct Dispatcher {
    /// Dispatch configuration
    pub(crate) config: DispatchConfig,

    /// Requests to replay, in submission order
    pub(crate) workload: Arc<[Request]>,

    /// Transport (shared across executions)
    pub(crate) transport: Arc<dyn Transport>,

    /// Plugin hooks (shared across executions)
    pub(crate) plugins: PluginHost,

    /// Emission rate source
    pub(crate) rate: Arc<RateController>,

    /// Outcome sender (cloned for each execution)
    pub(crate) outcome_tx: mpsc::Sender<OutcomeRecord>,

    /// In-flight limiter
    pub(crate) semaphore: Arc<Semaphore>,

    /// In-flight instrumentation
    pub(crate) gauge: Arc<InFlightGauge>,

    /// Cancellation signal
    pub(crate) cancel: CancelHandle,

    /// Lifecycle state
    pub(crate) state: watch::Sender<DispatchState>,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// Use `DispatcherBuilder` for a more ergonomic construction.
    pub fn new(
        config: DispatchConfig,
        workload: Arc<[Request]>,
        transport: Arc<dyn Transport>,
        plugins: PluginHost,
        rate: Arc<RateController>,
        outcome_tx: mpsc::Sender<OutcomeRecord>,
        cancel: CancelHandle,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_in_flight));
        let (state, _) = watch::channel(DispatchState::Init);

        Self {
            config,
            workload,
            transport,
            plugins,
            rate,
            outcome_tx,
            semaphore,
            gauge: Arc::new(InFlightGauge::default()),
            cancel,
            state,
        }
    }

    /// Get a cancellation handle
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Watch lifecycle transitions
    pub fn state_receiver(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    /// Requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.gauge.current()
    }

    /// Get the dispatch configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run the dispatch
    ///
    /// Consumes the dispatcher so that the outcome channel closes once the
    /// last execution has reported.
    pub async fn run(self) -> BenchResult<DispatchSummary> {
        let started_at = Instant::now();
        self.transition(DispatchState::Running)?;

        tracing::info!(
            iterations = self.config.iterations,
            workload = self.workload.len(),
            max_in_flight = self.config.max_in_flight,
            rate = self.rate.current_rate(),
            adaptive = self.rate.is_adaptive(),
            plugin = self.plugins.is_active(),
            "Starting dispatch"
        );

        let mut tasks = JoinSet::new();
        let submitted = match self.schedule(&mut tasks).await {
            Ok(submitted) => submitted,
            Err(e) => {
                tasks.abort_all();
                tracing::error!(error = %e, "Dispatch aborted");
                return Err(e);
            }
        };

        self.transition(DispatchState::Draining)?;
        tracing::debug!(
            submitted,
            in_flight = self.gauge.current(),
            "Submission finished, draining"
        );

        let abandoned = self.drain(&mut tasks).await.inspect_err(|e| {
            tracing::error!(error = %e, "Dispatch aborted while draining");
        })?;

        // A cancel that lands after the last submission and costs no
        // outcomes leaves the run complete
        let expected = self.config.iterations as u64 * self.workload.len() as u64;
        let terminal = if submitted < expected || abandoned > 0 {
            DispatchState::Cancelled
        } else {
            DispatchState::Done
        };
        self.transition(terminal)?;

        let summary = DispatchSummary {
            state: terminal,
            submitted,
            abandoned,
            peak_in_flight: self.gauge.peak(),
            started_at,
            elapsed: started_at.elapsed(),
            final_rate: self.rate.current_rate(),
        };

        tracing::info!(
            state = %summary.state,
            submitted = summary.submitted,
            abandoned = summary.abandoned,
            peak_in_flight = summary.peak_in_flight,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            final_rate = summary.final_rate,
            "Dispatch finished"
        );

        Ok(summary)
    }

    /// Submit every request of every iteration, or stop at cancellation
    async fn schedule(&self, tasks: &mut JoinSet<()>) -> BenchResult<u64> {
        let mut submitted: u64 = 0;

        'iterations: for iteration in 0..self.config.iterations {
            for index in 0..self.workload.len() {
                if self.cancel.is_cancelled() {
                    break 'iterations;
                }

                let permit = tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => break 'iterations,

                    permit = self.admit() => permit?,
                };

                // Surface panics early and keep the set small
                while let Some(result) = tasks.try_join_next() {
                    check_join(result)?;
                }

                let slot = self.gauge.enter(permit);
                let execution = Execution {
                    id: RequestId(submitted),
                    iteration,
                    index,
                    workload: Arc::clone(&self.workload),
                    transport: Arc::clone(&self.transport),
                    plugins: self.plugins.clone(),
                    outcome_tx: self.outcome_tx.clone(),
                };
                tasks.spawn(async move {
                    let _slot = slot;
                    execution.run().await;
                });
                submitted += 1;
            }
        }

        if self.cancel.is_cancelled() {
            tracing::info!(submitted, "Cancellation requested, stopping submission");
        }
        Ok(submitted)
    }

    /// Wait for the next emission slot, then for an in-flight slot
    async fn admit(&self) -> BenchResult<OwnedSemaphorePermit> {
        self.rate.pace().await;
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BenchError::internal("in-flight semaphore closed"))
    }

    /// Wait for in-flight executions; returns how many were abandoned
    async fn drain(&self, tasks: &mut JoinSet<()>) -> BenchResult<usize> {
        if !self.cancel.is_cancelled() {
            let cancelled = tokio::select! {
                biased;

                result = join_all(tasks) => {
                    result?;
                    false
                }

                _ = self.cancel.cancelled() => true,
            };
            if !cancelled {
                return Ok(0);
            }
        }

        let grace = self.config.drain_grace();
        tracing::info!(
            in_flight = tasks.len(),
            grace_secs = grace.as_secs_f64(),
            "Draining in-flight requests"
        );
        self.drain_with_grace(tasks, grace).await
    }

    async fn drain_with_grace(&self, tasks: &mut JoinSet<()>, grace: Duration) -> BenchResult<usize> {
        match tokio::time::timeout(grace, join_all(tasks)).await {
            Ok(result) => result.map(|()| 0),
            Err(_) => {
                let abandoned = tasks.len();
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                tracing::warn!(abandoned, "Grace period expired, abandoned in-flight requests");
                Ok(abandoned)
            }
        }
    }

    fn transition(&self, next: DispatchState) -> BenchResult<()> {
        let current = *self.state.borrow();
        if !current.can_transition_to(next) {
            return Err(BenchError::internal(format!(
                "invalid dispatch transition {current} -> {next}"
            )));
        }
        self.state.send_replace(next);
        tracing::debug!(from = %current, to = %next, "Dispatch state changed");
        Ok(())
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Automatically triggers cancellation on Ctrl+C.
    pub async fn run_with_signal_handling(self) -> BenchResult<DispatchSummary> {
        let cancel = self.cancel.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, cancelling dispatch...");
                    cancel.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;
        signal_handle.abort();
        result
    }

    /// Run with a timeout
    ///
    /// Automatically triggers cancellation when the timeout is reached.
    pub async fn run_with_timeout(self, timeout: Duration) -> BenchResult<DispatchSummary> {
        let cancel = self.cancel.clone();

        let timeout_handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::info!("Timeout reached, cancelling dispatch...");
            cancel.cancel();
        });

        let result = self.run().await;
        timeout_handle.abort();
        result
    }
}

async fn join_all(tasks: &mut JoinSet<()>) -> BenchResult<()> {
    while let Some(result) = tasks.join_next().await {
        check_join(result)?;
    }
    Ok(())
}

fn check_join(result: Result<(), JoinError>) -> BenchResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_panic() => Err(BenchError::internal(format!(
            "request execution panicked: {e}"
        ))),
        // Aborted by us during drain
        Err(_) => Ok(()),
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("workload", &self.workload.len())
            .field("transport", &self.transport.name())
            .field("plugins", &self.plugins)
            .field("rate", &self.rate)
            .field("state", &self.state())
            .finish()
    }
}
