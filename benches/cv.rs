use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use ramp_ml::prelude::*;
use rand::prelude::*;
use std::sync::Arc;

fn create_regression_data(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = rand::thread_rng();

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Create target as sum of features + noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Column::new(format!("feature_{}", i).into(), values))
        .collect();
    columns.push(Column::new("target".into(), target));

    DataFrame::new(columns).unwrap()
}

fn config(spec: ModelSpec, n_features: usize) -> ModelConfig {
    let features = (0..n_features)
        .map(|i| Feature::normalize(Feature::column(format!("feature_{}", i))))
        .collect();
    ModelConfig::new(spec, features, Feature::column("target")).with_metrics(vec![Metric::Rmse])
}

fn bench_cv(c: &mut Criterion) {
    let mut group = c.benchmark_group("cv");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let df = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("linear", n_rows), &df, |b, df| {
            b.iter(|| {
                // fresh store so nothing is served from cache
                let ctx = DataContext::new(df.clone(), Arc::new(MemoryStore::new()));
                let mut config = config(ModelSpec::linear_regression(), 10);
                cv_to(&mut config, black_box(&ctx), 5usize, 1, false, &mut std::io::sink()).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    let df = create_regression_data(10000, 20);
    let ctx = DataContext::new(df, Arc::new(MemoryStore::new()));
    let config = config(ModelSpec::linear_regression(), 20);

    group.bench_function("build_featureset", |b| {
        b.iter(|| build_featureset(black_box(&config.features), &ctx).unwrap())
    });

    group.finish();
}

fn bench_knn_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    group.sample_size(10);

    let df = create_regression_data(2000, 5);
    let index: Vec<usize> = (0..2000).collect();
    let mut ctx = DataContext::new(df, Arc::new(MemoryStore::new()))
        .with_train_index(index[..1500].to_vec());
    let mut config = config(ModelSpec::knn_regressor(5), 5);
    fit(&mut config, &ctx).unwrap();

    group.bench_function("predict_500", |b| {
        b.iter(|| predict(&mut config, &mut ctx, black_box(&index[1500..]), false).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_cv, bench_features, bench_knn_predict);
criterion_main!(benches);
