use criterion::{Criterion, criterion_group, criterion_main};
use pipeline_matrix::config::{Axis, PipelineConfig};
use pipeline_matrix::core::condition::Condition;
use pipeline_matrix::core::environment::JobEnv;
use pipeline_matrix::core::matrix;
use std::hint::black_box;

const DEPLOY_GUARD: &str =
    "[[ $BUILD_DOCS == true && $TRAVIS_BRANCH == master && $TRAVIS_PULL_REQUEST == false ]]";

fn wide_pipeline() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    for (name, count) in [("PYTHON_VERSION", 4), ("NUMPY_VERSION", 5), ("BACKEND", 3)] {
        config.matrix.axis.push(Axis {
            name: name.to_string(),
            values: (0..count).map(|i| format!("{}.{}", name.len(), i)).collect(),
        });
    }
    config
}

fn bench_expand(c: &mut Criterion) {
    let config = wide_pipeline();
    c.bench_function("expand_60_job_matrix", |b| {
        b.iter(|| matrix::expand(black_box(&config)).unwrap());
    });
}

fn bench_guards(c: &mut Criterion) {
    c.bench_function("parse_deploy_guard", |b| {
        b.iter(|| Condition::parse(black_box(DEPLOY_GUARD)).unwrap());
    });

    let guard = Condition::parse(DEPLOY_GUARD).unwrap();
    let env: JobEnv = [
        ("BUILD_DOCS", "true"),
        ("TRAVIS_BRANCH", "master"),
        ("TRAVIS_PULL_REQUEST", "false"),
    ]
    .into_iter()
    .collect();
    c.bench_function("evaluate_deploy_guard", |b| {
        b.iter(|| black_box(&guard).evaluate(black_box(&env)));
    });
}

criterion_group!(benches, bench_expand, bench_guards);
criterion_main!(benches);
