//! Adaptive rate state

use crate::config::AdaptiveConfig;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A rate change produced by an evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateAdjustment {
    /// Rate before the change
    pub from: f64,
    /// Rate after the change
    pub to: f64,
    /// Window success ratio that triggered it
    pub success_ratio: f64,
}

impl RateAdjustment {
    /// Whether the rate went up
    pub fn is_increase(&self) -> bool {
        self.to > self.from
    }
}

/// Sliding window of success flags plus adjustment bookkeeping
///
/// The window is evaluated every `window` outcomes. Evaluations that fall
/// inside the cooldown after the last adjustment are skipped.
#[derive(Debug)]
pub(crate) struct RateState {
    config: AdaptiveConfig,
    cooldown: Duration,
    current: f64,
    window: VecDeque<bool>,
    since_evaluation: usize,
    last_adjustment: Option<Instant>,
}

impl RateState {
    pub(crate) fn new(config: AdaptiveConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            current: config.starting_rate(),
            window: VecDeque::with_capacity(config.window),
            since_evaluation: 0,
            last_adjustment: None,
            config,
        }
    }

    pub(crate) fn current(&self) -> f64 {
        self.current
    }

    pub(crate) fn success_ratio(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let successes = self.window.iter().filter(|&&ok| ok).count();
        Some(successes as f64 / self.window.len() as f64)
    }

    pub(crate) fn record(&mut self, success: bool, now: Instant) -> Option<RateAdjustment> {
        if self.window.len() == self.config.window {
            self.window.pop_front();
        }
        self.window.push_back(success);
        self.since_evaluation += 1;

        if self.since_evaluation < self.config.window {
            return None;
        }
        self.since_evaluation = 0;

        if let Some(last) = self.last_adjustment {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }

        let success_ratio = self.success_ratio()?;
        let from = self.current;
        let target = if success_ratio >= self.config.target_success_ratio {
            from * (1.0 + self.config.increase_factor)
        } else {
            from * (1.0 - self.config.decrease_factor)
        };
        let to = target.clamp(self.config.min_rate, self.config.max_rate);

        if to == from {
            return None;
        }
        self.current = to;
        self.last_adjustment = Some(now);
        Some(RateAdjustment {
            from,
            to,
            success_ratio,
        })
    }
}
