use pbatch::{is_aggregate, unwrap_errors, AggregateError, BatchError, ErrorPolicy};
use pretty_assertions::assert_eq;
use std::error::Error as _;
use std::io;

fn io_failure(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, msg.to_string())
}

#[test]
fn test_is_aggregate_on_nothing() {
    assert!(!is_aggregate::<io::Error>(None));
}

#[test]
fn test_unwrap_single_failure_gives_one_element() {
    let err = BatchError::Failed(io_failure("disk full"));
    assert!(!is_aggregate(Some(&err)));

    let failures = unwrap_errors(err);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].to_string(), "disk full");
}

#[test]
fn test_aggregate_message_joins_members() {
    let agg = AggregateError::new(vec![io_failure("a"), io_failure("b"), io_failure("c")]);
    assert_eq!(agg.len(), 3);
    assert!(!agg.is_empty());
    assert_eq!(agg.to_string(), "multiple errors: a; b; c");

    let err = BatchError::Aggregate(agg);
    assert!(is_aggregate(Some(&err)));
    assert_eq!(err.to_string(), "multiple errors: a; b; c");
    assert_eq!(
        err.errors().iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
}

#[test]
fn test_aggregate_exposes_first_member_as_source() {
    let agg = AggregateError::new(vec![io_failure("root cause"), io_failure("later")]);
    assert_eq!(agg.source().map(|e| e.to_string()).as_deref(), Some("root cause"));
}

#[test]
fn test_batch_error_converts_into_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err::<(), _>(BatchError::Failed(io_failure("boom")))?;
        Ok(())
    }

    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(err.downcast_ref::<BatchError<io::Error>>().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_anyhow_as_item_error() {
    let outcome = pbatch::run(
        vec!["1", "two", "3", "four"],
        2,
        ErrorPolicy::ContinueOnError,
        |s: &'static str| async move {
            s.parse::<u32>()
                .map_err(|e| anyhow::anyhow!("cannot parse {:?}: {}", s, e))
        },
    )
    .await;

    assert_eq!(outcome.results, vec![1, 0, 3, 0]);

    let mut messages: Vec<String> = unwrap_errors(outcome.error.expect("two items fail"))
        .iter()
        .map(|e| e.to_string())
        .collect();
    messages.sort();
    assert_eq!(
        messages,
        vec![
            "cannot parse \"four\": invalid digit found in string",
            "cannot parse \"two\": invalid digit found in string",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_on_error_failure_is_one_of_the_failing_items() {
    let outcome = pbatch::run(
        (0..20).collect::<Vec<u32>>(),
        4,
        ErrorPolicy::StopOnError,
        |n| async move {
            if n % 5 == 4 {
                Err(io_failure(&format!("item {}", n)))
            } else {
                Ok(n)
            }
        },
    )
    .await;

    assert!(outcome.results.is_empty());
    let failures = unwrap_errors(outcome.error.expect("some items fail"));
    assert_eq!(failures.len(), 1);
    let message = failures[0].to_string();
    assert!(
        ["item 4", "item 9", "item 14", "item 19"].contains(&message.as_str()),
        "unexpected failure {}",
        message
    );
}
