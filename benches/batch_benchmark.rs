use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pbatch::{BatchExecutor, ErrorPolicy};
use tokio::runtime::Runtime;

async fn square(n: u64) -> Result<u64, String> {
    Ok(n * n)
}

async fn square_failing_on_multiples_of_ten(n: u64) -> Result<u64, String> {
    if n % 10 == 0 {
        Err(format!("error processing item {}", n))
    } else {
        Ok(n * n)
    }
}

fn benchmark_batch_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("run_1000_items");

    for batch_size in [1usize, 8, 64, 0] {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.iter(|| {
                rt.block_on(async {
                    let outcome = pbatch::run(
                        (0..1000u64).collect::<Vec<_>>(),
                        batch_size,
                        ErrorPolicy::StopOnError,
                        square,
                    )
                    .await;
                    black_box(outcome.results)
                })
            })
        });
    }

    group.finish();
}

fn benchmark_policies(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("continue_on_error_with_failures", |b| {
        let executor = BatchExecutor::new()
            .with_batch_size(16)
            .with_policy(ErrorPolicy::ContinueOnError);
        b.iter(|| {
            rt.block_on(async {
                let outcome = executor
                    .run((0..1000u64).collect::<Vec<_>>(), square_failing_on_multiples_of_ten)
                    .await;
                black_box(outcome.error)
            })
        })
    });

    c.bench_function("stop_on_error_with_failures", |b| {
        let executor = BatchExecutor::new()
            .with_batch_size(16)
            .with_policy(ErrorPolicy::StopOnError);
        b.iter(|| {
            rt.block_on(async {
                let outcome = executor
                    .run((1..1000u64).collect::<Vec<_>>(), square_failing_on_multiples_of_ten)
                    .await;
                black_box(outcome.error)
            })
        })
    });
}

criterion_group!(benches, benchmark_batch_sizes, benchmark_policies);
criterion_main!(benches);
