//! Bounded-parallelism batch execution
//!
//! The pieces, leaf to root: [`ConcurrencyLimiter`] bounds in-flight tasks,
//! [`ResultCollector`] holds per-item outputs by index, [`ErrorAggregator`]
//! applies the [`ErrorPolicy`], and [`BatchExecutor`] runs the tasks and
//! joins them.

/// Ordered result slots
pub mod collector;
/// Failure aggregation and error types
pub mod error_handling;
/// The executor and the `run` / `process` entry points
pub mod executor;
/// Concurrency limiter
pub mod limiter;
/// Policy, configuration, statistics and outcome types
pub mod types;

pub use collector::*;
pub use error_handling::*;
pub use executor::*;
pub use limiter::*;
pub use types::*;
