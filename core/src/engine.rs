//! Run wiring
//!
//! [`LoadTest`] validates configuration and loads every input before the first
//! request goes out, then runs the dispatcher and the collector side by side
//! and turns what the collector saw into a [`Report`].

use crate::channel::ChannelConfig;
use crate::collector::Collector;
use crate::config::EngineConfig;
use crate::dispatcher::{CancelHandle, DispatchSummary, DispatcherBuilder};
use crate::error::{BenchError, BenchResult};
use crate::plugin::{Plugin, PluginHost};
use crate::rate::RateController;
use crate::report::Report;
use crate::traits::Transport;
use crate::workload::WorkloadLoader;

use std::sync::Arc;
use tokio::task::JoinError;

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Final statistics
    pub report: Report,
    /// Dispatch bookkeeping
    pub dispatch: DispatchSummary,
    /// Lines written to the export file
    pub exported: usize,
}

/// A configured load test
pub struct LoadTest {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    plugin: Option<Arc<dyn Plugin>>,
    channel_config: ChannelConfig,
    cancel: CancelHandle,
    handle_signals: bool,
}

impl LoadTest {
    /// Create a load test that sends requests through `transport`
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            plugin: None,
            channel_config: ChannelConfig::default(),
            cancel: CancelHandle::new(),
            handle_signals: false,
        }
    }

    /// Cancel the run on Ctrl+C
    pub fn with_signal_handling(mut self) -> Self {
        self.handle_signals = true;
        self
    }

    /// Use `plugin` instead of loading `plugin_path`
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Set the channel configuration
    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Handle that cancels the run (e.g. from a signal handler)
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute the load test
    ///
    /// # Errors
    ///
    /// Configuration, workload and plugin errors are returned before any
    /// request is dispatched. Export write failures and engine invariant
    /// violations abort the run.
    pub async fn run(&self) -> BenchResult<RunOutput> {
        self.config.validate()?;

        let workload = WorkloadLoader::new(self.config.default_timeout())
            .load_path(&self.config.workload_path)?;
        if workload.is_empty() {
            return Err(BenchError::config(format!(
                "workload '{}' contains no requests",
                self.config.workload_path.display()
            )));
        }

        let plugins = match &self.plugin {
            Some(plugin) => PluginHost::new(Arc::clone(plugin)),
            None => PluginHost::load_optional(self.config.plugin_path.as_deref())?,
        };

        let rate = Arc::new(RateController::new(&self.config.rate)?);

        let (dispatcher, outcome_rx) = DispatcherBuilder::new()
            .config(self.config.dispatch.clone())
            .workload(workload)
            .transport(Arc::clone(&self.transport))
            .plugins(plugins)
            .rate(Arc::clone(&rate))
            .channel_config(self.channel_config.clone())
            .cancel_handle(self.cancel.clone())
            .build()?;

        let mut collector = Collector::new(outcome_rx, rate);
        if let Some(path) = &self.config.output_path {
            collector = collector.with_file(path).await.map_err(|e| {
                BenchError::config(format!("failed to create '{}': {e}", path.display()))
            })?;
        }

        let deadline = self.config.duration().map(|limit| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::info!(
                    limit_secs = limit.as_secs_f64(),
                    "Run duration reached, cancelling"
                );
                cancel.cancel();
            })
        });

        let collector_task = tokio::spawn(collector.run());
        let dispatch_task = if self.handle_signals {
            tokio::spawn(dispatcher.run_with_signal_handling())
        } else {
            tokio::spawn(dispatcher.run())
        };

        let collected = match collector_task.await.map_err(join_error)? {
            Ok(collected) => collected,
            Err(e) => {
                tracing::error!(error = %e, "Export failed, cancelling run");
                self.cancel.cancel();
                let _ = dispatch_task.await;
                abort(deadline);
                return Err(e);
            }
        };
        let dispatch = dispatch_task.await.map_err(join_error)?;
        abort(deadline);
        let dispatch = dispatch?;

        let elapsed = collected
            .last_outcome_at
            .map(|at| at.saturating_duration_since(dispatch.started_at))
            .unwrap_or(dispatch.elapsed);
        let report = collected
            .aggregator
            .finish(elapsed, dispatch.is_cancelled());

        tracing::info!(
            total = report.total_requests,
            successful = report.successful_requests,
            failed = report.failed_requests,
            qps = report.qps,
            p99 = report.response_times.p99,
            cancelled = report.cancelled,
            "Load test completed"
        );

        Ok(RunOutput {
            report,
            dispatch,
            exported: collected.written,
        })
    }
}

fn abort(task: Option<tokio::task::JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
    }
}

fn join_error(e: JoinError) -> BenchError {
    BenchError::internal(format!("engine task failed: {e}"))
}

impl std::fmt::Debug for LoadTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTest")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .field("plugin", &self.plugin.as_ref().map(|p| p.name().to_string()))
            .field("handle_signals", &self.handle_signals)
            .finish()
    }
}
