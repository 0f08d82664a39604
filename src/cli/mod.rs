//! CLI argument parsing and command dispatch

mod commands;

pub use commands::dispatch;

use clap::{Args, Parser, Subcommand};
use anyhow::Context;
use qpsbench_core::config::{
    positive_secs, secs_to_duration, DEFAULT_DRAIN_GRACE_SECS, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QPS,
    DEFAULT_TIMEOUT_SECS,
};
use qpsbench_core::{AdaptiveConfig, DispatchConfig, EngineConfig, RateMode};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "qpsbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a workload against the target
    Run(RunArgs),
    /// Rebuild a report from an exported responses file
    Report {
        /// Path to the JSON Lines export
        #[arg(short, long)]
        input: PathBuf,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a workload (and plugin) without sending anything
    Validate {
        /// Path to the workload file
        #[arg(short, long)]
        workload: PathBuf,
        /// Rule plugin file
        #[arg(short, long)]
        plugin: Option<PathBuf>,
        /// Default request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: f64,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the workload file (JSON Lines)
    #[arg(short, long, required_unless_present = "config")]
    pub workload: Option<PathBuf>,

    /// Engine configuration as JSON; other run flags are ignored
    #[arg(short, long, conflicts_with = "workload")]
    pub config: Option<PathBuf>,

    /// Passes over the workload
    #[arg(short = 'n', long, default_value_t = 1)]
    pub iterations: usize,

    /// Fixed emission rate in requests per second
    #[arg(long, default_value_t = DEFAULT_QPS, conflicts_with = "adaptive")]
    pub qps: f64,

    /// Adjust the rate from observed success ratio
    #[arg(long)]
    pub adaptive: bool,

    /// Adaptive lower bound
    #[arg(long, requires = "adaptive")]
    pub min_rate: Option<f64>,

    /// Adaptive upper bound
    #[arg(long, requires = "adaptive")]
    pub max_rate: Option<f64>,

    /// Adaptive starting rate (defaults to the lower bound)
    #[arg(long, requires = "adaptive")]
    pub initial_rate: Option<f64>,

    /// Success ratio at or above which the rate increases
    #[arg(long, requires = "adaptive")]
    pub target: Option<f64>,

    /// Outcomes per evaluation window
    #[arg(long, requires = "adaptive")]
    pub window: Option<usize>,

    /// Seconds between adjustments
    #[arg(long, requires = "adaptive")]
    pub cooldown: Option<f64>,

    /// Multiplicative increase step
    #[arg(long, requires = "adaptive")]
    pub increase: Option<f64>,

    /// Multiplicative decrease step
    #[arg(long, requires = "adaptive")]
    pub decrease: Option<f64>,

    /// Cap on simultaneously in-flight requests
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// Export every response as JSON Lines to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the report to this file as well as stdout
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Rule plugin file
    #[arg(short, long)]
    pub plugin: Option<PathBuf>,

    /// Default request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: f64,

    /// Seconds to wait for in-flight requests after cancellation
    #[arg(long, default_value_t = DEFAULT_DRAIN_GRACE_SECS)]
    pub drain_grace: f64,

    /// Stop scheduling after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,
}

impl RunArgs {
    /// Rate mode described by the flags
    pub fn rate_mode(&self) -> RateMode {
        if !self.adaptive {
            return RateMode::Fixed { qps: self.qps };
        }

        let defaults = AdaptiveConfig::default();
        RateMode::Adaptive(AdaptiveConfig {
            min_rate: self.min_rate.unwrap_or(defaults.min_rate),
            max_rate: self.max_rate.unwrap_or(defaults.max_rate),
            initial_rate: self.initial_rate,
            target_success_ratio: self.target.unwrap_or(defaults.target_success_ratio),
            window: self.window.unwrap_or(defaults.window),
            increase_factor: self.increase.unwrap_or(defaults.increase_factor),
            decrease_factor: self.decrease.unwrap_or(defaults.decrease_factor),
            cooldown_secs: self.cooldown.unwrap_or(defaults.cooldown_secs),
        })
    }

    /// Engine configuration described by the flags
    ///
    /// Seconds are validated here since `Duration::from_secs_f64` panics on
    /// negative or non-finite input.
    pub fn engine_config(&self, workload: PathBuf) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::new(workload)
            .with_rate(self.rate_mode())
            .with_dispatch(
                DispatchConfig::new(self.iterations)
                    .with_max_in_flight(self.max_in_flight)
                    .with_drain_grace(seconds("--drain-grace", self.drain_grace, true)?),
            )
            .with_default_timeout(seconds("--timeout", self.timeout, false)?);

        if let Some(output) = &self.output {
            config = config.with_output(output);
        }
        if let Some(plugin) = &self.plugin {
            config = config.with_plugin(plugin);
        }
        if let Some(duration) = self.duration {
            config = config.with_duration(seconds("--duration", duration, false)?);
        }
        Ok(config)
    }
}

pub(crate) fn seconds(flag: &str, value: f64, allow_zero: bool) -> anyhow::Result<Duration> {
    let duration = if allow_zero {
        secs_to_duration(value)
    } else {
        positive_secs(value)
    };
    duration.with_context(|| format!("{flag} must be a positive number of seconds, got {value}"))
}
