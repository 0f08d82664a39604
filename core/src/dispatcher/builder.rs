//! Builder pattern for Dispatcher construction

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::ChannelConfig;
use crate::config::DispatchConfig;
use crate::error::{BenchError, BenchResult};
use crate::plugin::PluginHost;
use crate::rate::RateController;
use crate::request::Request;
use crate::response::OutcomeRecord;
use crate::traits::Transport;

use super::cancel::CancelHandle;
use super::executor::Dispatcher;

/// Builder for creating a Dispatcher with proper configuration
///
/// # Example
///
/// ```ignore
/// let (dispatcher, outcome_rx) = DispatcherBuilder::new()
///     .workload(requests)
///     .transport(transport)
///     .rate(Arc::new(RateController::new(&RateMode::Fixed { qps: 5.0 })?))
///     .config(DispatchConfig::new(5))
///     .build()?;
/// ```
pub struct DispatcherBuilder {
    config: DispatchConfig,
    workload: Vec<Request>,
    transport: Option<Arc<dyn Transport>>,
    rate: Option<Arc<RateController>>,
    plugins: PluginHost,
    channel_config: ChannelConfig,
    cancel: CancelHandle,
}

impl DispatcherBuilder {
    /// Create a new dispatcher builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
            workload: Vec::new(),
            transport: None,
            rate: None,
            plugins: PluginHost::none(),
            channel_config: ChannelConfig::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Set the full dispatch configuration
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of passes over the workload
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Set the in-flight cap
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.config.max_in_flight = max_in_flight;
        self
    }

    /// Set the requests to replay
    pub fn workload(mut self, workload: Vec<Request>) -> Self {
        self.workload = workload;
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the rate controller (shared with the collector)
    pub fn rate(mut self, rate: Arc<RateController>) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set the plugin host
    pub fn plugins(mut self, plugins: PluginHost) -> Self {
        self.plugins = plugins;
        self
    }

    /// Set the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Use an externally owned cancellation handle
    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build the dispatcher and return it along with the outcome receiver
    ///
    /// # Errors
    ///
    /// Returns an error if transport or rate controller are not set, if the
    /// workload is empty, or if configuration validation fails.
    pub fn build(self) -> BenchResult<(Dispatcher, mpsc::Receiver<OutcomeRecord>)> {
        let transport = self
            .transport
            .ok_or_else(|| BenchError::missing_config("transport"))?;

        let rate = self
            .rate
            .ok_or_else(|| BenchError::missing_config("rate controller"))?;

        if self.workload.is_empty() {
            return Err(BenchError::config("workload is empty"));
        }

        self.config.validate()?;

        let (outcome_tx, outcome_rx) = mpsc::channel(self.channel_config.outcome_buffer);

        let dispatcher = Dispatcher::new(
            self.config,
            self.workload.into(),
            transport,
            self.plugins,
            rate,
            outcome_tx,
            self.cancel,
        );

        Ok((dispatcher, outcome_rx))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
