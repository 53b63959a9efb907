//! Benchmarks for the fuzzy scorer.
//!
//! Run with: cargo bench -p sieve-match

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sieve_match::{Query, Scorer};
use std::hint::black_box;

fn paths(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("src/module_{}/component_{}/file_{i}.rs", i % 37, i % 101))
        .collect()
}

fn bench_score(c: &mut Criterion) {
    let candidates = paths(10_000);
    let mut group = c.benchmark_group("score");
    group.throughput(Throughput::Elements(candidates.len() as u64));

    for query in ["f", "mod", "scf12", "component_100/file"] {
        let prepared = Query::new(query);
        group.bench_with_input(BenchmarkId::new("rows", query), &prepared, |b, q| {
            let mut scorer = Scorer::new();
            b.iter(|| {
                let mut total = 0.0;
                for cand in &candidates {
                    if let Some(s) = scorer.score(q, cand) {
                        total += s;
                    }
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_positions(c: &mut Criterion) {
    let candidates = paths(1_000);
    let query = Query::new("mcf");
    c.bench_function("positions/mcf", |b| {
        let mut scorer = Scorer::new();
        b.iter(|| {
            for cand in &candidates {
                black_box(scorer.score_with_positions(&query, cand));
            }
        });
    });
}

criterion_group!(benches, bench_score, bench_positions);
criterion_main!(benches);
