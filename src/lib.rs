//! # pbatch
//!
//! Bounded-parallelism batch execution on Tokio.
//!
//! Give it an ordered list of items and an async operation; it runs the
//! operation over every item concurrently, never with more than `batch_size`
//! items in flight, and returns the outputs in input order.
//!
//! ## Quick Start
//!
//! ```rust
//! use pbatch::ErrorPolicy;
//!
//! # async fn example() {
//! let outcome = pbatch::run(vec![1, 2, 3, 4, 5], 2, ErrorPolicy::ContinueOnError, |n: i32| async move {
//!     if n == 3 {
//!         Err(format!("error processing item {}", n))
//!     } else {
//!         Ok(n * n)
//!     }
//! })
//! .await;
//!
//! assert_eq!(outcome.results, vec![1, 4, 0, 16, 25]);
//! let failures = pbatch::unwrap_errors(outcome.error.unwrap());
//! assert_eq!(failures, vec!["error processing item 3".to_string()]);
//! # }
//! ```
//!
//! ## Failure policies
//!
//! - [`ErrorPolicy::StopOnError`]: the first failure is returned verbatim,
//!   results are discarded, and no new item is scheduled once the failure has
//!   been seen. Items already running finish before the call returns.
//! - [`ErrorPolicy::ContinueOnError`]: every item runs; failed slots keep
//!   their default value and all failures come back as one
//!   [`AggregateError`].
//!
//! ## Modules
//!
//! - [`batch`]: limiter, result collector, error aggregation and the executor
//! - [`metrics`]: Prometheus metrics for runs and items

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for pbatch configuration operations
pub type Result<T> = std::result::Result<T, PbatchError>;

/// Main error type for pbatch configuration
#[derive(Error, Debug)]
pub enum PbatchError {
    /// Unknown error policy name
    #[error("Invalid error policy: {0}")]
    InvalidPolicy(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Batch execution engine
pub mod batch;

/// Metrics collection
pub mod metrics;

pub use batch::{
    is_aggregate, process, run, unwrap_errors, AggregateError, BatchConfig, BatchError,
    BatchExecutor, BatchOutcome, BatchStats, ErrorPolicy,
};
