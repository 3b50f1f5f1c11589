use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use stapi_core::filter::{evaluate, validate, ContextValue, EvaluationContext, FilterExpr};
use stapi_core::models::{FieldSpec, Product};

fn sample_filter() -> FilterExpr {
    FilterExpr::and([
        FilterExpr::between("off_nadir", 0, 30),
        FilterExpr::one_of("vehicle_id", [1, 2, 5, 7, 8]),
        FilterExpr::not(FilterExpr::eq("platform", "retired-1")),
    ])
}

fn sample_context() -> EvaluationContext {
    EvaluationContext::new()
        .with("off_nadir", ContextValue::from_json(&json!(21)).unwrap())
        .with("vehicle_id", ContextValue::from_json(&json!([2, 9])).unwrap())
        .with("platform", ContextValue::from_json(&json!("platform-a")).unwrap())
}

fn benchmark_filter_evaluation(c: &mut Criterion) {
    let expr = sample_filter();
    let context = sample_context();
    c.bench_function("filter_evaluate", |b| {
        b.iter(|| evaluate(black_box(&expr), black_box(&context)))
    });
}

fn benchmark_filter_validation(c: &mut Criterion) {
    let product = Product::builder("bench")
        .constraint("off_nadir", FieldSpec::integer_range(0, 45))
        .constraint("vehicle_id", FieldSpec::integer_one_of([1, 2, 5, 7, 8]))
        .constraint("platform", FieldSpec::string())
        .build();
    let expr = sample_filter();
    c.bench_function("filter_validate", |b| {
        b.iter(|| validate(black_box(&expr), black_box(&product.constraints)))
    });
}

fn benchmark_cql2_parse(c: &mut Criterion) {
    let body = sample_filter().to_cql2_json();
    c.bench_function("filter_from_cql2_json", |b| {
        b.iter(|| FilterExpr::from_cql2_json(black_box(&body)))
    });
}

criterion_group!(
    benches,
    benchmark_filter_evaluation,
    benchmark_filter_validation,
    benchmark_cql2_parse
);
criterion_main!(benches);
