//! Run configuration types
//!
//! Durations are stored as floating-point seconds so configurations read
//! naturally when serialized; accessor methods convert them to [`Duration`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

/// Default grace period for in-flight requests after cancellation
pub const DEFAULT_DRAIN_GRACE_SECS: f64 = 5.0;

/// Default cap on simultaneously in-flight requests
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

/// Default fixed emission rate
pub const DEFAULT_QPS: f64 = 10.0;

/// Adaptive rate control parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Lower bound on the emission rate
    pub min_rate: f64,
    /// Upper bound on the emission rate
    pub max_rate: f64,
    /// Starting rate; `min_rate` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_rate: Option<f64>,
    /// Success ratio at or above which the rate increases
    pub target_success_ratio: f64,
    /// Number of outcomes in the sliding window (and between evaluations)
    pub window: usize,
    /// Multiplicative increase step (alpha)
    pub increase_factor: f64,
    /// Multiplicative decrease step (beta)
    pub decrease_factor: f64,
    /// Minimum time between two adjustments
    pub cooldown_secs: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_rate: 1.0,
            max_rate: 100.0,
            initial_rate: None,
            target_success_ratio: 0.95,
            window: 20,
            increase_factor: 0.1,
            decrease_factor: 0.2,
            cooldown_secs: 1.0,
        }
    }
}

impl AdaptiveConfig {
    /// Create a config with the given bounds and target
    pub fn new(min_rate: f64, max_rate: f64, target_success_ratio: f64) -> Self {
        Self {
            min_rate,
            max_rate,
            target_success_ratio,
            ..Default::default()
        }
    }

    /// Set the window size
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Set the starting rate
    pub fn with_initial_rate(mut self, rate: f64) -> Self {
        self.initial_rate = Some(rate);
        self
    }

    /// Set the increase and decrease factors
    pub fn with_factors(mut self, increase: f64, decrease: f64) -> Self {
        self.increase_factor = increase;
        self.decrease_factor = decrease;
        self
    }

    /// Set the cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_secs = cooldown.as_secs_f64();
        self
    }

    /// Cooldown as a duration; zero if `cooldown_secs` does not validate
    pub fn cooldown(&self) -> Duration {
        secs_to_duration(self.cooldown_secs).unwrap_or_default()
    }

    /// Starting rate clamped into the bounds
    pub fn starting_rate(&self) -> f64 {
        self.initial_rate
            .unwrap_or(self.min_rate)
            .clamp(self.min_rate, self.max_rate)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if rate_interval(self.min_rate).is_none() || rate_interval(self.max_rate).is_none() {
            return Err(ConfigError::InvalidRate(format!(
                "adaptive rate bounds must be positive and pace-able, got [{}, {}]",
                self.min_rate, self.max_rate
            )));
        }
        if self.min_rate > self.max_rate {
            return Err(ConfigError::InvalidRate(format!(
                "min_rate {} exceeds max_rate {}",
                self.min_rate, self.max_rate
            )));
        }
        if let Some(initial) = self.initial_rate {
            if rate_interval(initial).is_none() {
                return Err(ConfigError::InvalidRate(format!(
                    "initial_rate must be positive and pace-able, got {initial}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.target_success_ratio) {
            return Err(ConfigError::InvalidAdaptive(
                "target_success_ratio must be within [0, 1]".into(),
            ));
        }
        if self.window == 0 {
            return Err(ConfigError::InvalidAdaptive(
                "window must be at least 1".into(),
            ));
        }
        if !is_positive(self.increase_factor) {
            return Err(ConfigError::InvalidAdaptive(
                "increase_factor must be positive".into(),
            ));
        }
        if !(self.decrease_factor > 0.0 && self.decrease_factor < 1.0) {
            return Err(ConfigError::InvalidAdaptive(
                "decrease_factor must be within (0, 1)".into(),
            ));
        }
        if secs_to_duration(self.cooldown_secs).is_none() {
            return Err(ConfigError::InvalidAdaptive(format!(
                "cooldown_secs must be a non-negative number of seconds, got {}",
                self.cooldown_secs
            )));
        }
        Ok(())
    }
}

/// How the emission rate is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RateMode {
    /// Constant rate
    Fixed {
        /// Requests per second
        qps: f64,
    },
    /// Rate adjusted from the observed success ratio
    Adaptive(AdaptiveConfig),
}

impl Default for RateMode {
    fn default() -> Self {
        RateMode::Fixed { qps: DEFAULT_QPS }
    }
}

impl RateMode {
    /// Validate the rate parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RateMode::Fixed { qps } if rate_interval(*qps).is_none() => Err(
                ConfigError::InvalidRate(format!("qps must be positive and pace-able, got {qps}")),
            ),
            RateMode::Fixed { .. } => Ok(()),
            RateMode::Adaptive(adaptive) => adaptive.validate(),
        }
    }
}

/// Dispatch configuration
///
/// Defines how many times the workload is replayed, how many requests may be
/// outstanding at once, and how long cancellation waits for stragglers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Passes over the workload
    pub iterations: usize,

    /// Maximum simultaneously in-flight requests
    pub max_in_flight: usize,

    /// Time in-flight requests get to finish after cancellation
    pub drain_grace_secs: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            drain_grace_secs: DEFAULT_DRAIN_GRACE_SECS,
        }
    }
}

impl DispatchConfig {
    /// Create a config with the given iteration count
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    /// Set the in-flight cap
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Set the drain grace period
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace_secs = grace.as_secs_f64();
        self
    }

    /// Drain grace period as a duration; zero if `drain_grace_secs` does not validate
    pub fn drain_grace(&self) -> Duration {
        secs_to_duration(self.drain_grace_secs).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations(
                "iterations must be at least 1".into(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidInFlight(
                "max_in_flight must be at least 1".into(),
            ));
        }
        if secs_to_duration(self.drain_grace_secs).is_none() {
            return Err(ConfigError::InvalidDuration(format!(
                "drain_grace_secs must be a non-negative number of seconds, got {}",
                self.drain_grace_secs
            )));
        }
        Ok(())
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON Lines workload file
    pub workload_path: PathBuf,

    /// Response export file; no export when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Rule plugin file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_path: Option<PathBuf>,

    /// Emission rate control
    #[serde(default)]
    pub rate: RateMode,

    /// Dispatch parameters
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Timeout for workload records that do not set one
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,

    /// Optional wall-clock limit; the run is cancelled when it expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

impl EngineConfig {
    /// Create a config for the given workload with defaults elsewhere
    pub fn new(workload_path: impl Into<PathBuf>) -> Self {
        Self {
            workload_path: workload_path.into(),
            output_path: None,
            plugin_path: None,
            rate: RateMode::default(),
            dispatch: DispatchConfig::default(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            duration_secs: None,
        }
    }

    /// Set the export file
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Set the plugin file
    pub fn with_plugin(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_path = Some(path.into());
        self
    }

    /// Set the rate mode
    pub fn with_rate(mut self, rate: RateMode) -> Self {
        self.rate = rate;
        self
    }

    /// Set the dispatch parameters
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the default request timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Set a wall-clock limit for the run
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = Some(duration.as_secs_f64());
        self
    }

    /// Default request timeout as a duration
    ///
    /// Only meaningful once [`validate`](Self::validate) has passed; an
    /// unrepresentable value reads as zero.
    pub fn default_timeout(&self) -> Duration {
        secs_to_duration(self.default_timeout_secs).unwrap_or_default()
    }

    /// Wall-clock limit as a duration
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs
            .map(|secs| secs_to_duration(secs).unwrap_or_default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate.validate()?;
        self.dispatch.validate()?;
        if positive_secs(self.default_timeout_secs).is_none() {
            return Err(ConfigError::InvalidDuration(format!(
                "default_timeout_secs must be a positive number of seconds, got {}",
                self.default_timeout_secs
            )));
        }
        if let Some(secs) = self.duration_secs {
            if positive_secs(secs).is_none() {
                return Err(ConfigError::InvalidDuration(format!(
                    "duration_secs must be a positive number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Seconds as a [`Duration`]
///
/// `None` for negative, non-finite and out-of-range values, where
/// `Duration::from_secs_f64` would panic.
pub fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Like [`secs_to_duration`], but also rejects zero
pub fn positive_secs(secs: f64) -> Option<Duration> {
    secs_to_duration(secs).filter(|duration| !duration.is_zero())
}

/// Spacing between submissions at `rate` requests per second
///
/// `None` unless the rate is positive and its interval is a non-zero
/// representable duration.
pub(crate) fn rate_interval(rate: f64) -> Option<Duration> {
    if !is_positive(rate) {
        return None;
    }
    positive_secs(1.0 / rate)
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid iteration count
    #[error("Invalid iterations: {0}")]
    InvalidIterations(String),

    /// Invalid in-flight cap
    #[error("Invalid in-flight cap: {0}")]
    InvalidInFlight(String),

    /// Invalid rate or rate bounds
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Invalid adaptive control parameter
    #[error("Invalid adaptive parameter: {0}")]
    InvalidAdaptive(String),

    /// Invalid duration value
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::new("workload.jsonl");
        assert_eq!(config.dispatch.iterations, 1);
        assert_eq!(config.dispatch.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.rate, RateMode::Fixed { qps: DEFAULT_QPS });
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = EngineConfig::new("w.jsonl")
            .with_output("out.jsonl")
            .with_plugin("plugin.json")
            .with_rate(RateMode::Fixed { qps: 5.0 })
            .with_dispatch(DispatchConfig::new(5).with_max_in_flight(8))
            .with_duration(Duration::from_secs(60));

        assert_eq!(config.dispatch.iterations, 5);
        assert_eq!(config.dispatch.max_in_flight, 8);
        assert_eq!(config.duration(), Some(Duration::from_secs(60)));
        assert!(config.plugin_path.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config = EngineConfig::new("w.jsonl").with_dispatch(DispatchConfig::new(0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIterations(_))
        ));
    }

    #[test]
    fn test_zero_in_flight_rejected() {
        let dispatch = DispatchConfig::new(1).with_max_in_flight(0);
        assert!(matches!(
            dispatch.validate(),
            Err(ConfigError::InvalidInFlight(_))
        ));
    }

    #[test]
    fn test_non_positive_qps_rejected() {
        for qps in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert!(RateMode::Fixed { qps }.validate().is_err(), "qps {qps}");
        }
    }

    #[test]
    fn test_adaptive_bounds_validation() {
        assert!(AdaptiveConfig::new(1.0, 20.0, 0.9).validate().is_ok());
        assert!(AdaptiveConfig::new(20.0, 1.0, 0.9).validate().is_err());
        assert!(AdaptiveConfig::new(0.0, 1.0, 0.9).validate().is_err());
        assert!(AdaptiveConfig::new(1.0, 20.0, 1.5).validate().is_err());
        assert!(AdaptiveConfig::new(1.0, 20.0, 0.9)
            .with_window(0)
            .validate()
            .is_err());
        assert!(AdaptiveConfig::new(1.0, 20.0, 0.9)
            .with_factors(0.1, 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_starting_rate_is_clamped() {
        let config = AdaptiveConfig::new(2.0, 10.0, 0.9);
        assert_eq!(config.starting_rate(), 2.0);
        assert_eq!(config.clone().with_initial_rate(50.0).starting_rate(), 10.0);
        assert_eq!(config.with_initial_rate(4.0).starting_rate(), 4.0);
    }

    #[test]
    fn test_rate_mode_serialization() {
        let fixed = RateMode::Fixed { qps: 5.0 };
        let json = serde_json::to_string(&fixed).unwrap();
        assert_eq!(json, r#"{"mode":"fixed","qps":5.0}"#);

        let adaptive: RateMode =
            serde_json::from_str(r#"{"mode":"adaptive","min_rate":1.0,"max_rate":20.0}"#).unwrap();
        match adaptive {
            RateMode::Adaptive(config) => {
                assert_eq!(config.max_rate, 20.0);
                assert_eq!(config.window, 20);
            }
            other => panic!("expected adaptive mode, got {other:?}"),
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::new("w.jsonl").with_dispatch(DispatchConfig::new(3));
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_unrepresentable_seconds_rejected() {
        let mut config = EngineConfig::new("w.jsonl");
        config.dispatch.drain_grace_secs = 1e20;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration(_))));
        assert_eq!(config.dispatch.drain_grace(), Duration::ZERO);

        let mut config = EngineConfig::new("w.jsonl");
        config.default_timeout_secs = 1e20;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration(_))));
        assert_eq!(config.default_timeout(), Duration::ZERO);

        let mut config = EngineConfig::new("w.jsonl");
        config.duration_secs = Some(1e20);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDuration(_))));

        let mut adaptive = AdaptiveConfig::new(1.0, 20.0, 0.9);
        adaptive.cooldown_secs = 1e20;
        assert!(matches!(adaptive.validate(), Err(ConfigError::InvalidAdaptive(_))));
        assert_eq!(adaptive.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_rates_without_a_representable_interval_rejected() {
        for qps in [1e-25, 1e300] {
            assert!(
                matches!(RateMode::Fixed { qps }.validate(), Err(ConfigError::InvalidRate(_))),
                "qps {qps}"
            );
        }
        assert!(AdaptiveConfig::new(1e-25, 20.0, 0.9).validate().is_err());
        assert!(AdaptiveConfig::new(1.0, 1e300, 0.9).validate().is_err());
        assert!(AdaptiveConfig::new(1.0, 20.0, 0.9)
            .with_initial_rate(1e-25)
            .validate()
            .is_err());
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(secs_to_duration(0.0), Some(Duration::ZERO));
        assert_eq!(positive_secs(0.0), None);
        for secs in [-1.0, f64::NAN, f64::INFINITY, 1e20] {
            assert_eq!(secs_to_duration(secs), None, "secs {secs}");
        }
    }
}
