//! Failure handling for batch runs
//!
//! Under [`ErrorPolicy::StopOnError`] only the first reported failure is
//! kept. Under [`ErrorPolicy::ContinueOnError`] every failure is kept and,
//! once the run has joined, surfaced as one [`AggregateError`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use crate::batch::ErrorPolicy;

/// Error returned by a run in which at least one item failed
#[derive(Error, Debug)]
pub enum BatchError<E> {
    /// The first failure observed under StopOnError, verbatim
    #[error("{0}")]
    Failed(E),

    /// Every failure observed under ContinueOnError
    #[error("{0}")]
    Aggregate(AggregateError<E>),
}

impl<E> BatchError<E> {
    /// Whether this is an aggregate of several failures
    pub fn is_aggregate(&self) -> bool {
        matches!(self, BatchError::Aggregate(_))
    }

    /// Borrow the constituent failures
    pub fn errors(&self) -> Vec<&E> {
        match self {
            BatchError::Failed(err) => vec![err],
            BatchError::Aggregate(agg) => agg.errors().iter().collect(),
        }
    }

    /// The constituent failures: the aggregate's members, or the single failure
    pub fn into_errors(self) -> Vec<E> {
        match self {
            BatchError::Failed(err) => vec![err],
            BatchError::Aggregate(agg) => agg.into_errors(),
        }
    }

    /// The aggregate, if this is one
    pub fn as_aggregate(&self) -> Option<&AggregateError<E>> {
        match self {
            BatchError::Aggregate(agg) => Some(agg),
            BatchError::Failed(_) => None,
        }
    }
}

/// Whether `err` is present and is an aggregate
pub fn is_aggregate<E>(err: Option<&BatchError<E>>) -> bool {
    err.is_some_and(BatchError::is_aggregate)
}

/// Normalize one or many failures into a list
pub fn unwrap_errors<E>(err: BatchError<E>) -> Vec<E> {
    err.into_errors()
}

/// Composite of every failure from a ContinueOnError run
///
/// Order follows the order in which tasks reported, which is not the input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateError<E> {
    errors: Vec<E>,
}

impl<E> AggregateError<E> {
    /// Wrap a list of failures
    pub fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    /// Borrow the failures
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    /// Take the failures
    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether there are no failures
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple errors: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for AggregateError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors.first().map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// Collects failures reported by the tasks of one run
#[derive(Debug)]
pub struct ErrorAggregator<E> {
    policy: ErrorPolicy,
    failed: AtomicBool,
    failures: Mutex<Vec<E>>,
}

impl<E> ErrorAggregator<E> {
    /// Create an aggregator applying `policy`
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            failed: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Record a failure. Returns false if it was dropped because an earlier
    /// failure already holds the StopOnError slot.
    pub fn report(&self, err: E) -> bool {
        let mut failures = self.failures.lock();
        let kept = match self.policy {
            ErrorPolicy::StopOnError if !failures.is_empty() => false,
            _ => {
                failures.push(err);
                true
            }
        };
        self.failed.store(true, Ordering::Release);
        kept
    }

    /// Non-blocking check used by the scheduling loop
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Turn the held failures into the run's error, if any
    pub fn finish(&self) -> Option<BatchError<E>> {
        let failures = std::mem::take(&mut *self.failures.lock());
        if failures.is_empty() {
            return None;
        }
        match self.policy {
            ErrorPolicy::StopOnError => failures.into_iter().next().map(BatchError::Failed),
            ErrorPolicy::ContinueOnError => Some(BatchError::Aggregate(AggregateError::new(failures))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Error)]
    #[error("{0}")]
    struct ItemError(String);

    #[test]
    fn test_stop_keeps_first_failure_only() {
        let aggregator = ErrorAggregator::new(ErrorPolicy::StopOnError);
        assert!(!aggregator.has_failed());

        assert!(aggregator.report(ItemError("first".into())));
        assert!(!aggregator.report(ItemError("second".into())));
        assert!(aggregator.has_failed());

        match aggregator.finish() {
            Some(BatchError::Failed(err)) => assert_eq!(err, ItemError("first".into())),
            other => panic!("expected first failure, got {:?}", other),
        }
    }

    #[test]
    fn test_continue_keeps_every_failure() {
        let aggregator = ErrorAggregator::new(ErrorPolicy::ContinueOnError);
        aggregator.report(ItemError("a".into()));
        aggregator.report(ItemError("b".into()));

        let err = aggregator.finish().expect("failures were reported");
        assert!(err.is_aggregate());
        assert_eq!(err.to_string(), "multiple errors: a; b");
        assert_eq!(err.into_errors(), vec![ItemError("a".into()), ItemError("b".into())]);
    }

    #[test]
    fn test_no_failures_means_no_error() {
        let stop: ErrorAggregator<ItemError> = ErrorAggregator::new(ErrorPolicy::StopOnError);
        let cont: ErrorAggregator<ItemError> = ErrorAggregator::new(ErrorPolicy::ContinueOnError);
        assert!(stop.finish().is_none());
        assert!(cont.finish().is_none());
    }

    #[test]
    fn test_unwrap_normalizes_single_failure() {
        let single = BatchError::Failed(ItemError("only".into()));
        assert!(!single.is_aggregate());
        assert_eq!(single.errors(), vec![&ItemError("only".into())]);
        assert_eq!(unwrap_errors(single), vec![ItemError("only".into())]);
    }

    #[test]
    fn test_is_aggregate_helper() {
        assert!(!is_aggregate::<ItemError>(None));

        let failed = BatchError::Failed(ItemError("x".into()));
        assert!(!is_aggregate(Some(&failed)));

        let agg = BatchError::Aggregate(AggregateError::new(vec![ItemError("x".into())]));
        assert!(is_aggregate(Some(&agg)));
        assert_eq!(agg.as_aggregate().map(AggregateError::len), Some(1));
    }

    #[test]
    fn test_aggregate_source_is_first_member() {
        use std::error::Error as _;

        let agg = AggregateError::new(vec![ItemError("root".into()), ItemError("other".into())]);
        assert_eq!(agg.source().map(|e| e.to_string()), Some("root".to_string()));
        assert!(AggregateError::<ItemError>::new(vec![]).source().is_none());
    }
}
