//! Benchmarks for MQL parsing and compilation
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mql::query::{parse_statement, AggregatorRegistry, Compiler};

/// A statement of `n` selects unioned together
fn union_statement(n: usize) -> String {
    let mut text = String::new();
    for i in 0..n {
        text.push_str(&format!(
            "s{i} = select cpu.load.{i} where host = \"h{i}\", \"h{}\" and dc = eu from 2 hours ago to now group by host;\n",
            i + 1
        ));
    }
    let refs: Vec<String> = (0..n).map(|i| format!("s{i}")).collect();
    text.push_str(&format!("union(of ({}))", refs.join(", ")));
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for size in [1, 10, 100] {
        let text = union_statement(size);

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_function(format!("union_{}", size), |b| {
            b.iter(|| parse_statement(black_box(&text)).unwrap())
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let registry = AggregatorRegistry::default();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for size in [1, 10, 100] {
        let statement = parse_statement(&union_statement(size)).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("union_{}", size), |b| {
            b.iter(|| {
                Compiler::new(&registry)
                    .compile_at(black_box(&statement), now)
                    .unwrap()
            })
        });
    }

    let lifted = parse_statement(
        r#"a = select cpu where host = "h1" from 2 hours ago; b = max(of a); threshold(of b, threshold=0.9, operator=GREATER_THAN)"#,
    )
    .unwrap();
    group.bench_function("lift_and_threshold", |b| {
        b.iter(|| {
            Compiler::new(&registry)
                .compile_at(black_box(&lifted), now)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile);
criterion_main!(benches);
