use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use emc::ident::{resolve_provider, SymbolTable};
use emc::plan::{build_plan, GenerationPlan};
use emc::render::{render, Dialect, RenderOptions};
use emc::schema::Manifest;

const WIDGETS: &str = include_str!("../compiler/tests/fixtures/widgets.json");
const MINIMAL: &str = include_str!("../compiler/tests/fixtures/minimal.json");

fn scenarios() -> Vec<(&'static str, String)> {
    vec![
        ("minimal", MINIMAL.to_string()),
        ("widgets", WIDGETS.to_string()),
        ("scaled_8x64", generate_scaling_manifest(8, 64)),
    ]
}

/// `n_providers` providers of `n_events` events each. Payload shapes cycle
/// through a small set so template deduplication has real work to do.
fn generate_scaling_manifest(n_providers: usize, n_events: usize) -> String {
    const SHAPES: [&str; 4] = [
        r#"{ "kind": "data", "name": "Value", "in_type": "UInt32" }"#,
        r#"{ "kind": "data", "name": "Name", "in_type": "UnicodeString" },
           { "kind": "data", "name": "Flags", "in_type": "HexInt64" }"#,
        r#"{ "kind": "data", "name": "Count", "in_type": "UInt16" },
           { "kind": "data", "name": "Items", "in_type": "Int32", "count": "Count" }"#,
        r#"{ "kind": "data", "name": "Id", "in_type": "GUID" },
           { "kind": "data", "name": "Blob", "in_type": "CountedBinary" }"#,
    ];
    let mut providers = Vec::with_capacity(n_providers);
    for p in 0..n_providers {
        let mut events = Vec::with_capacity(n_events);
        for e in 0..n_events {
            let shape = SHAPES[(p + e) % SHAPES.len()];
            events.push(format!(
                r#"{{ "value": {}, "symbol": "P{}_Event{}", "template": {{ "properties": [ {} ] }} }}"#,
                e + 1,
                p,
                e,
                shape
            ));
        }
        providers.push(format!(
            r#"{{ "name": "Bench-Provider{}", "guid": "{:08x}-0000-4000-8000-000000000000", "events": [ {} ] }}"#,
            p,
            p + 1,
            events.join(",\n")
        ));
    }
    format!(r#"{{ "providers": [ {} ] }}"#, providers.join(",\n"))
}

fn load(source: &str) -> Manifest {
    Manifest::from_json(source).expect("benchmark manifest must load")
}

fn resolve_all(manifest: &Manifest) -> Vec<SymbolTable> {
    manifest
        .providers
        .iter()
        .map(|p| resolve_provider(p).expect("benchmark manifest must resolve"))
        .collect()
}

fn plan_all(manifest: &Manifest) -> GenerationPlan {
    let tables = resolve_all(manifest);
    build_plan(manifest, &tables)
        .plan
        .expect("benchmark manifest must plan")
}

// KPI: full compile latency (load -> resolve -> plan -> render).
fn bench_kpi_full_compile_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/full_compile_latency");
    let options = RenderOptions::default();
    for (name, source) in scenarios() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &source, |b, source| {
            b.iter(|| {
                let manifest = load(black_box(source));
                let plan = plan_all(&manifest);
                black_box(render(&plan, &options));
            });
        });
    }
    group.finish();
}

// KPI: phase-level latency on the widgets manifest.
fn bench_kpi_phase_latency(c: &mut Criterion) {
    let manifest = load(WIDGETS);

    {
        let mut group = c.benchmark_group("kpi/phase_latency/resolve");
        group.bench_function("widgets", |b| {
            b.iter(|| black_box(resolve_all(black_box(&manifest))));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("kpi/phase_latency/plan");
        group.bench_function("widgets", |b| {
            b.iter_batched(
                || resolve_all(&manifest),
                |tables| black_box(build_plan(&manifest, &tables)),
                BatchSize::SmallInput,
            );
        });
        group.finish();
    }

    let plan = plan_all(&manifest);
    let mut group = c.benchmark_group("kpi/phase_latency/render");
    for (name, dialect) in [("cxx", Dialect::Cxx), ("mc", Dialect::Mc)] {
        let options = RenderOptions {
            dialect,
            ..RenderOptions::default()
        };
        group.bench_function(name, |b| {
            b.iter(|| black_box(render(black_box(&plan), &options)));
        });
    }
    group.finish();
}

// KPI: compile scalability in provider count.
fn bench_kpi_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/scaling");
    let options = RenderOptions::default();
    for n in [1usize, 4, 16] {
        let source = generate_scaling_manifest(n, 32);
        group.bench_with_input(BenchmarkId::new("providers", n), &source, |b, source| {
            b.iter(|| {
                let manifest = load(black_box(source));
                black_box(render(&plan_all(&manifest), &options));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_kpi_full_compile_latency,
    bench_kpi_phase_latency,
    bench_kpi_scaling
);
criterion_main!(benches);
