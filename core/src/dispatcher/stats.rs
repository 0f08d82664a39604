//! Dispatch statistics and in-flight instrumentation

use super::state::DispatchState;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;

/// Summary of a finished dispatch run
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    /// Terminal state
    pub state: DispatchState,
    /// Requests handed to execution
    pub submitted: u64,
    /// In-flight requests force-abandoned after the drain grace period
    pub abandoned: usize,
    /// Highest number of simultaneously in-flight requests observed
    pub peak_in_flight: usize,
    /// When the run entered `Running`
    pub started_at: Instant,
    /// Time from start to the terminal state
    pub elapsed: Duration,
    /// Target rate when the run ended
    pub final_rate: f64,
}

impl DispatchSummary {
    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state == DispatchState::Cancelled
    }
}

/// Counts in-flight executions and remembers the peak
#[derive(Debug, Default)]
pub(crate) struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub(crate) fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Mark one execution in flight while it holds `permit`
    pub(crate) fn enter(self: &Arc<Self>, permit: OwnedSemaphorePermit) -> InFlightSlot {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightSlot {
            gauge: Arc::clone(self),
            _permit: permit,
        }
    }
}

/// An admitted execution
///
/// The gauge is decremented in `drop` before the permit field is released, so
/// the count never exceeds the number of held permits.
pub(crate) struct InFlightSlot {
    gauge: Arc<InFlightGauge>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}
