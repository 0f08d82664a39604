//! Emission rate control
//!
//! [`RateController`] owns the target emission rate. In fixed mode the rate
//! never changes and pacing is delegated to a `governor` GCRA limiter with a
//! burst of one. In adaptive mode the collector feeds every outcome back via
//! [`RateController::record_outcome`]; the rate moves multiplicatively and is
//! clamped to the configured bounds.
//!
//! The dispatcher reads the rate lock-free. A read may miss an adjustment that
//! lands concurrently, which delays it by at most one pacing decision.

mod window;

pub use window::RateAdjustment;

use crate::config::{rate_interval, AdaptiveConfig, RateMode};
use crate::error::{BenchError, BenchResult};

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use window::RateState;

enum Pacer {
    Fixed(RateLimiter<NotKeyed, InMemoryState, DefaultClock>),
    Adaptive {
        state: Mutex<RateState>,
        next_slot: Mutex<Option<tokio::time::Instant>>,
    },
}

/// Owner of the emission rate
pub struct RateController {
    pacer: Pacer,
    /// f64 bits of the current rate
    current: AtomicU64,
    bounds: (f64, f64),
}

impl RateController {
    /// Create a controller for the given mode
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the mode's parameters are invalid.
    pub fn new(mode: &RateMode) -> BenchResult<Self> {
        mode.validate()?;
        match mode {
            RateMode::Fixed { qps } => Self::fixed(*qps),
            RateMode::Adaptive(config) => Ok(Self::adaptive(config.clone())),
        }
    }

    fn fixed(qps: f64) -> BenchResult<Self> {
        let quota = rate_interval(qps)
            .and_then(Quota::with_period)
            .ok_or_else(|| BenchError::config(format!("qps {qps} cannot be paced")))?
            .allow_burst(NonZeroU32::MIN);
        Ok(Self {
            pacer: Pacer::Fixed(RateLimiter::direct(quota)),
            current: AtomicU64::new(qps.to_bits()),
            bounds: (qps, qps),
        })
    }

    fn adaptive(config: AdaptiveConfig) -> Self {
        let state = RateState::new(config.clone());
        Self {
            current: AtomicU64::new(state.current().to_bits()),
            pacer: Pacer::Adaptive {
                state: Mutex::new(state),
                next_slot: Mutex::new(None),
            },
            bounds: (config.min_rate, config.max_rate),
        }
    }

    /// Current target rate in requests per second
    pub fn current_rate(&self) -> f64 {
        f64::from_bits(self.current.load(Ordering::Acquire))
    }

    /// Rate bounds as `(min, max)`; both equal the rate in fixed mode
    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    /// Whether the rate reacts to outcomes
    pub fn is_adaptive(&self) -> bool {
        matches!(self.pacer, Pacer::Adaptive { .. })
    }

    /// Spacing between submissions at the current rate
    pub fn interval_before_next(&self) -> Duration {
        rate_interval(self.current_rate()).unwrap_or_default()
    }

    /// Success ratio over the current window, if any outcomes were seen
    pub fn window_success_ratio(&self) -> Option<f64> {
        match &self.pacer {
            Pacer::Fixed(_) => None,
            Pacer::Adaptive { state, .. } => state.lock().success_ratio(),
        }
    }

    /// Wait until the next submission is allowed
    ///
    /// The first call returns immediately. A late caller is not compensated
    /// with a burst; the next slot is measured from the later of the previous
    /// slot plus one interval and now.
    pub async fn pace(&self) {
        match &self.pacer {
            Pacer::Fixed(limiter) => limiter.until_ready().await,
            Pacer::Adaptive { next_slot, .. } => {
                let slot = {
                    let mut next = next_slot.lock();
                    let now = tokio::time::Instant::now();
                    let slot = next.map_or(now, |at| at.max(now));
                    *next = Some(slot + self.interval_before_next());
                    slot
                };
                tokio::time::sleep_until(slot).await;
            }
        }
    }

    /// Feed one outcome into the adaptive window
    ///
    /// Returns the adjustment if this outcome completed an evaluation that
    /// changed the rate. A no-op in fixed mode.
    pub fn record_outcome(&self, success: bool) -> Option<RateAdjustment> {
        self.record_outcome_at(success, Instant::now())
    }

    pub(crate) fn record_outcome_at(&self, success: bool, now: Instant) -> Option<RateAdjustment> {
        let Pacer::Adaptive { state, .. } = &self.pacer else {
            return None;
        };
        let mut state = state.lock();
        let adjustment = state.record(success, now)?;
        self.current.store(adjustment.to.to_bits(), Ordering::Release);
        Some(adjustment)
    }
}

impl std::fmt::Debug for RateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateController")
            .field("adaptive", &self.is_adaptive())
            .field("current_rate", &self.current_rate())
            .field("bounds", &self.bounds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive(min: f64, max: f64, target: f64, window: usize) -> RateController {
        RateController::new(&RateMode::Adaptive(
            AdaptiveConfig::new(min, max, target)
                .with_window(window)
                .with_cooldown(Duration::ZERO),
        ))
        .unwrap()
    }

    #[test]
    fn test_fixed_rate_is_constant() {
        let controller = RateController::new(&RateMode::Fixed { qps: 5.0 }).unwrap();
        assert!(!controller.is_adaptive());
        assert_eq!(controller.current_rate(), 5.0);
        assert_eq!(controller.interval_before_next(), Duration::from_millis(200));
        for _ in 0..100 {
            assert!(controller.record_outcome(false).is_none());
        }
        assert_eq!(controller.current_rate(), 5.0);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let err = RateController::new(&RateMode::Fixed { qps: 0.0 }).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_extreme_rates_rejected_without_panic() {
        for qps in [1e-25, 1e300] {
            let err = RateController::new(&RateMode::Fixed { qps }).unwrap_err();
            assert!(err.is_config(), "qps {qps}");
        }
        let adaptive = RateMode::Adaptive(AdaptiveConfig::new(1e-25, 10.0, 0.9));
        assert!(RateController::new(&adaptive).unwrap_err().is_config());
    }

    #[test]
    fn test_adaptive_starts_at_min() {
        let controller = adaptive(1.0, 20.0, 0.9, 10);
        assert_eq!(controller.current_rate(), 1.0);
        assert_eq!(controller.bounds(), (1.0, 20.0));
        assert!(controller.window_success_ratio().is_none());
    }

    #[test]
    fn test_all_failures_converge_to_min() {
        let controller = RateController::new(&RateMode::Adaptive(
            AdaptiveConfig::new(1.0, 20.0, 0.9)
                .with_window(10)
                .with_initial_rate(20.0)
                .with_cooldown(Duration::ZERO),
        ))
        .unwrap();

        for _ in 0..1000 {
            controller.record_outcome(false);
        }
        assert_eq!(controller.current_rate(), 1.0);
    }

    #[test]
    fn test_all_successes_converge_to_max() {
        let controller = adaptive(1.0, 20.0, 0.9, 10);
        for _ in 0..1000 {
            controller.record_outcome(true);
        }
        assert_eq!(controller.current_rate(), 20.0);
    }

    #[test]
    fn test_rate_never_leaves_bounds() {
        let controller = adaptive(2.0, 8.0, 0.5, 3);
        // Deterministic pseudo-random sequence
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..5000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            controller.record_outcome(seed % 3 != 0);
            let rate = controller.current_rate();
            assert!((2.0..=8.0).contains(&rate), "rate {rate} out of bounds");
        }
    }

    #[test]
    fn test_cooldown_limits_adjustments() {
        let controller = RateController::new(&RateMode::Adaptive(
            AdaptiveConfig::new(1.0, 100.0, 0.9)
                .with_window(1)
                .with_cooldown(Duration::from_secs(1)),
        ))
        .unwrap();

        let start = Instant::now();
        let adjustments = (0..50)
            .filter_map(|i| {
                controller.record_outcome_at(true, start + Duration::from_millis(i * 100))
            })
            .count();
        // One adjustment at t=0, then one per elapsed second
        assert_eq!(adjustments, 5);
    }

    #[tokio::test]
    async fn test_adaptive_pace_spacing() {
        let controller = RateController::new(&RateMode::Adaptive(
            AdaptiveConfig::new(20.0, 20.0, 0.9),
        ))
        .unwrap();

        let start = std::time::Instant::now();
        for _ in 0..5 {
            controller.pace().await;
        }
        // First slot is immediate, then 4 × 50ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(190), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_fixed_pace_spacing() {
        let controller = RateController::new(&RateMode::Fixed { qps: 50.0 }).unwrap();
        let start = std::time::Instant::now();
        for _ in 0..6 {
            controller.pace().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(90), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_debug_output() {
        let controller = RateController::new(&RateMode::Fixed { qps: 5.0 }).unwrap();
        let debug = format!("{controller:?}");
        assert!(debug.contains("RateController"));
        assert!(debug.contains("5.0"));
    }
}
