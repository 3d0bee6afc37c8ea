//! Benchmarks for recipe-builder core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use recipe_builder::core::manifest::{digest, serialize};
use recipe_builder::core::parser::parse_recipe;

/// A recipe with `n` merges and `n` nested branches, each nest carrying
/// a merge of its own.
fn recipe_text(n: usize) -> String {
    let mut out = String::from("# builder format 0.4 deb-version {debupstream}+{revno}\nlp:base tag:1.0\n");
    for i in 0..n {
        out.push_str(&format!("merge fix-{i:04} lp:fixes/{i} revno:{i}\n"));
        out.push_str(&format!("nest part-{i:04} lp:parts/{i} vendor/part-{i:04}\n"));
        out.push_str(&format!("  merge part-fix-{i:04} lp:parts/{i}/fix\n"));
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_recipe");
    for n in [1, 16, 128] {
        let text = recipe_text(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &text, |b, text| {
            b.iter(|| {
                let plan = parse_recipe(black_box(text)).unwrap();
                black_box(plan);
            });
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_manifest");
    for n in [1, 16, 128] {
        let plan = parse_recipe(&recipe_text(n)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &plan, |b, plan| {
            b.iter(|| black_box(serialize(black_box(plan))));
        });
    }
    group.finish();
}

fn bench_digest(c: &mut Criterion) {
    let plan = parse_recipe(&recipe_text(128)).unwrap();
    c.bench_function("manifest_digest_128", |b| {
        b.iter(|| black_box(digest(black_box(&plan))));
    });
}

criterion_group!(benches, bench_parse, bench_serialize, bench_digest);
criterion_main!(benches);
