//! Dispatcher for run lifecycle management
//!
//! The Dispatcher owns the scheduling loop of a run:
//! - pacing submissions through the shared [`RateController`](crate::rate::RateController)
//! - bounding in-flight requests with a counting semaphore
//! - executing each request through the plugin hooks and the transport
//! - draining or abandoning in-flight work on cancellation
//!
//! Request-level failures are data: they become `Outcome::Failure` values and
//! never interrupt the loop. Only invariant violations (a panicking execution,
//! an illegal state transition) abort the run.
//!
//! # Example
//!
//! ```ignore
//! use qpsbench_core::{DispatcherBuilder, RateController, RateMode};
//!
//! let rate = Arc::new(RateController::new(&RateMode::Fixed { qps: 5.0 })?);
//! let (dispatcher, outcome_rx) = DispatcherBuilder::new()
//!     .workload(requests)
//!     .transport(transport)
//!     .rate(rate)
//!     .iterations(5)
//!     .build()?;
//!
//! let summary = dispatcher.run_with_signal_handling().await?;
//! ```

mod builder;
mod cancel;
mod execution;
mod executor;
mod state;
mod stats;

pub use builder::DispatcherBuilder;
pub use cancel::CancelHandle;
pub use executor::Dispatcher;
pub use state::DispatchState;
pub use stats::DispatchSummary;
