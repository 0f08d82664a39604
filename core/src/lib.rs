//! qpsbench-core: Load generation engine
//!
//! This crate provides everything between a workload file and a report:
//!
//! - Request and outcome data structures
//! - Workload loading and plugin hooks
//! - Fixed and adaptive rate control
//! - Bounded-concurrency dispatch with cooperative cancellation
//! - Outcome export and report aggregation
//!
//! The HTTP client itself lives behind the [`Transport`] trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod rate;
pub mod report;
pub mod request;
pub mod response;
pub mod traits;
pub mod workload;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::ChannelConfig;
pub use collector::{Collector, CollectorSummary};
pub use config::{AdaptiveConfig, ConfigError, DispatchConfig, EngineConfig, RateMode};
pub use dispatcher::{CancelHandle, DispatchState, DispatchSummary, Dispatcher, DispatcherBuilder};
pub use engine::{LoadTest, RunOutput};
pub use error::*;
pub use plugin::{Plugin, PluginError, PluginHost, RulePlugin};
pub use rate::{RateAdjustment, RateController};
pub use report::{LatencySummary, Report, ReportAggregator};
pub use request::*;
pub use response::*;
pub use traits::*;
pub use workload::WorkloadLoader;
