//! Template resolution benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use templar::context::GenericContext;
use templar::{resolve_template_string, resolve_template_struct, ResolveOptions};

fn bench_template_strings(c: &mut Criterion) {
    let ctx = GenericContext::new(json!({
        "var": {"name": "api", "port": 8080, "tags": ["a", "b", "c"]},
        "env": {"name": "prod"}
    }));
    let opts = ResolveOptions::default();

    let templates = [
        ("literal", "Simple text with no templates"),
        ("single", "${var.name}"),
        ("embedded", "${var.name}-${env.name}:${var.port}"),
        ("operators", "${var.port > 1024 && env.name == 'prod' ? 'high' : 'low'}"),
        ("helpers", "${upper(join(var.tags, '-'))}"),
        ("blocks", "${if var.missing || true}on${else}off${endif}"),
    ];

    let mut group = c.benchmark_group("template_string");
    for (name, template) in templates {
        group.bench_function(name, |b| {
            b.iter(|| resolve_template_string(black_box(template), &ctx, &opts))
        });
    }
    group.finish();
}

fn bench_structure(c: &mut Criterion) {
    let services: serde_json::Map<String, serde_json::Value> = (0..50)
        .map(|i| (format!("svc-{}", i), json!({"port": 8000 + i})))
        .collect();
    let ctx = GenericContext::new(json!({"var": {"services": services}}));
    let tree = json!({
        "$merge": {"kind": "Deployment"},
        "services": {
            "$forEach": "${var.services}",
            "$return": {"name": "${item.key}", "port": "${item.value.port}"}
        },
        "args": ["--a", {"$concat": ["--b", "--c"]}]
    });
    let opts = ResolveOptions::default();

    c.bench_function("structure_for_each_50", |b| {
        b.iter(|| resolve_template_struct(black_box(&tree), &ctx, &opts))
    });
}

criterion_group!(benches, bench_template_strings, bench_structure);
criterion_main!(benches);
