use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use stageweld::prelude::*;

fn source(ctx: &Context, size: u64) -> Receiver<u64> {
    let (tx, rx) = channel();
    ctx.spawn(async move {
        for i in 0..size {
            if tx.send(i).await.is_err() {
                break;
            }
        }
    });
    rx
}

async fn drain(rx: Receiver<u64>) -> u64 {
    let mut count = 0;
    while let Some(v) = rx.recv().await {
        black_box(v);
        count += 1;
    }
    count
}

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff");

    for size in [100u64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size));

        group.bench_with_input(BenchmarkId::new("channel", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let ctx = Context::new();
                    assert_eq!(drain(source(&ctx, size)).await, size);
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("relay", size), size, |b, &size| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let ctx = Context::new();
                    let out = relay(&ctx, source(&ctx, size));
                    assert_eq!(drain(out).await, size);
                })
            });
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for width in [2usize, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::new("width", width), width, |b, &width| {
            b.iter(|| {
                tokio::runtime::Runtime::new().unwrap().block_on(async {
                    let ctx = Context::new();
                    let sources: Vec<_> = (0..width).map(|_| source(&ctx, 1000)).collect();
                    let merged = merge(&ctx, sources);
                    assert_eq!(drain(merged).await, 1000 * width as u64);
                })
            });
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    group.bench_function("tee_10000", |b| {
        b.iter(|| {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let ctx = Context::new();
                let (left, right) = split(&ctx, source(&ctx, 10000));
                let (left, right) = tokio::join!(drain(left), drain(right));
                assert_eq!(left, right);
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_handoff, bench_merge, bench_split);
criterion_main!(benches);
