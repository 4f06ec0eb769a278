//! Benchmarks for scriptvault core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scriptvault::core::types::{Catalog, Interpreter, ScriptRecord};
use scriptvault::core::{dispatcher, meta, sync};
use scriptvault::mirror::journal::hash_bytes;
use scriptvault::runtime::shell;

fn bench_blake3_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake3_body");
    for size in [64, 1024, 16384] {
        let input = vec![b'x'; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(hash_bytes(black_box(input))));
        });
    }
    group.finish();
}

fn bench_shebang_inference(c: &mut Criterion) {
    let bodies = [
        ("python", "#!/usr/bin/python\nprint('x')"),
        ("env_bash", "#!/usr/bin/env bash -e\necho hi"),
        ("plain", "echo no shebang"),
    ];
    let mut group = c.benchmark_group("shebang_inference");
    for (name, body) in bodies {
        group.bench_with_input(BenchmarkId::from_parameter(name), &body, |b, body| {
            b.iter(|| black_box(shell::command_line(black_box(body))));
        });
    }
    group.finish();
}

fn bench_alias_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_resolution");
    for n in [10, 100, 1000] {
        let agents: Vec<String> = (0..n).map(|i| format!("agent{}", i)).collect();
        group.bench_with_input(BenchmarkId::new("all", n), &agents, |b, agents| {
            b.iter(|| black_box(dispatcher::resolve_targets("all", black_box(agents))));
        });
        group.bench_with_input(BenchmarkId::new("all_agents", n), &agents, |b, agents| {
            b.iter(|| black_box(dispatcher::resolve_targets("all agents", black_box(agents))));
        });
    }
    group.finish();
}

fn bench_meta_extract(c: &mut Criterion) {
    let body = format!(
        "/*** BEGIN META {{\n  \"name\": \"Disk usage\",\n  \"comment\": \"free space\",\n  \"parameters\": [\"MOUNT\"]\n}} END META **/\n{}",
        "print(MOUNT);\n".repeat(200)
    );
    c.bench_function("meta_extract", |b| {
        b.iter(|| black_box(meta::extract(black_box(&body))));
    });
}

fn bench_reconcile_noop(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = Catalog::default();
    for i in 0..200 {
        let id = format!("s{:03}.rhai", i);
        std::fs::write(dir.path().join(&id), "print(1);").unwrap();
        catalog.upsert(ScriptRecord::new(id.clone(), id, Interpreter::Engine, ""));
    }

    c.bench_function("reconcile_noop_200", |b| {
        b.iter(|| {
            let report = sync::reconcile(dir.path(), "rhai", &mut catalog).unwrap();
            black_box(report);
        });
    });
}

criterion_group!(
    benches,
    bench_blake3_body,
    bench_shebang_inference,
    bench_alias_resolution,
    bench_meta_extract,
    bench_reconcile_noop,
);
criterion_main!(benches);
