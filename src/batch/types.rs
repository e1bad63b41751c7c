use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::BatchError;
use crate::{PbatchError, Result};

/// How a run reacts to a failing item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep the first failure, stop scheduling new items and discard all results
    #[default]
    StopOnError,
    /// Run every item and report all failures together
    ContinueOnError,
}

impl ErrorPolicy {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::StopOnError => "stop_on_error",
            ErrorPolicy::ContinueOnError => "continue_on_error",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = PbatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stop_on_error" | "stop" => Ok(ErrorPolicy::StopOnError),
            "continue_on_error" | "continue" => Ok(ErrorPolicy::ContinueOnError),
            _ => Err(PbatchError::InvalidPolicy(s.to_string())),
        }
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of items in flight at once. Zero means unbounded.
    pub batch_size: usize,
    /// Failure policy for the whole run
    pub policy: ErrorPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: num_cpus::get(),
            policy: ErrorPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Create a configuration with an explicit batch size and policy
    pub fn new(batch_size: usize, policy: ErrorPolicy) -> Self {
        Self { batch_size, policy }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the failure policy
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Progress callback, invoked with `(completed, total)` as each item finishes
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Statistics for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of items submitted
    pub total_items: usize,
    /// Number of items that were admitted and spawned
    pub scheduled: usize,
    /// Items whose operation returned a value
    pub succeeded: usize,
    /// Items whose operation returned an error
    pub failed: usize,
    /// Items whose operation panicked
    pub panicked: usize,
    /// Whether scheduling stopped before the last item
    pub stopped_early: bool,
    /// Wall-clock duration of the run, join included
    pub duration: Duration,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl BatchStats {
    pub(crate) fn empty(total_items: usize) -> Self {
        Self {
            total_items,
            scheduled: 0,
            succeeded: 0,
            failed: 0,
            panicked: 0,
            stopped_early: false,
            duration: Duration::ZERO,
            started_at: Utc::now(),
        }
    }

    /// Percentage of submitted items that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 100.0;
        }
        (self.succeeded as f64 / self.total_items as f64) * 100.0
    }
}

/// What a run produced: the result slots and, if anything failed, the error
#[derive(Debug)]
pub struct BatchOutcome<R, E> {
    /// One slot per input item, in input order. Empty when a StopOnError run failed.
    pub results: Vec<R>,
    /// First failure or the aggregate of all failures, depending on policy
    pub error: Option<BatchError<E>>,
    /// Run statistics
    pub stats: BatchStats,
}

impl<R, E> BatchOutcome<R, E> {
    /// True when no item failed
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Results if nothing failed, otherwise the error. Partial results are dropped.
    pub fn into_result(self) -> std::result::Result<Vec<R>, BatchError<E>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }

    /// Split into `(results, error)`, keeping partial results under ContinueOnError
    pub fn into_parts(self) -> (Vec<R>, Option<BatchError<E>>) {
        (self.results, self.error)
    }
}
