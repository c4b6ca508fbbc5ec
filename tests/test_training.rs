//! Integration test: fit / predict / cross-validation workflow

use ramp_ml::prelude::*;
use ramp_ml::training::{Fold, FittedModel};
use polars::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn classification_df() -> DataFrame {
    df!(
        "f1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
                   1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5, 10.5],
        "f2" => &[10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0,
                   9.5, 8.5, 7.5, 6.5, 5.5, 4.5, 3.5, 2.5, 1.5, 0.5],
        "target" => &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0,
                      0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
    )
    .unwrap()
}

fn regression_df() -> DataFrame {
    df!(
        "x1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
                   11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0],
        "x2" => &[5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0, 4.0, 6.0, 0.0,
                   5.5, 3.5, 8.5, 1.5, 9.5, 2.5, 7.5, 4.5, 6.5, 0.5],
        "group" => &[1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5],
        "target" => &[3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0,
                      33.0, 36.0, 39.0, 42.0, 45.0, 48.0, 51.0, 54.0, 57.0, 60.0]
    )
    .unwrap()
}

fn regression_config() -> ModelConfig {
    ModelConfig::new(
        ModelSpec::linear_regression(),
        vec![Feature::column("x1"), Feature::column("x2")],
        Feature::column("target"),
    )
    .with_metrics(vec![Metric::Rmse, Metric::R2])
}

/// Memory store that counts how often it is written to
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    saves: AtomicUsize,
    hits: AtomicUsize,
}

impl ModelStore for CountingStore {
    fn load(&self, key: &str) -> ramp_ml::Result<Option<FittedModel>> {
        let found = self.inner.load(key)?;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(found)
    }

    fn save(&self, key: &str, model: &FittedModel) -> ramp_ml::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, model)
    }
}

#[test]
fn test_cv_linear_regression_recovers_exact_fit() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config();

    let result = cv_to(&mut config, &ctx, 5usize, 1, false, &mut Vec::new()).unwrap();

    let rmse = result.scores_for("rmse").unwrap();
    assert_eq!(rmse.len(), 5);
    assert!(rmse.iter().all(|s| *s < 1e-6), "rmse: {:?}", rmse);
    assert!(result.scores_for("r2").unwrap().iter().all(|s| *s > 0.999));
}

#[test]
fn test_repeated_cv_reuses_stored_models() {
    let store = Arc::new(CountingStore::default());
    let ctx = DataContext::new(regression_df(), store.clone());
    let folds = || {
        CrossValidator::new(CVStrategy::KFold {
            n_splits: 4,
            shuffle: true,
        })
        .with_random_state(7)
    };

    let mut config = regression_config();
    let first = cv_to(&mut config, &ctx, folds(), 1, false, &mut Vec::new()).unwrap();
    assert_eq!(store.saves.load(Ordering::SeqCst), 4);
    assert_eq!(store.hits.load(Ordering::SeqCst), 0);

    let mut config = regression_config();
    let second = cv_to(&mut config, &ctx, folds(), 1, false, &mut Vec::new()).unwrap();
    assert_eq!(store.saves.load(Ordering::SeqCst), 4);
    assert_eq!(store.hits.load(Ordering::SeqCst), 4);

    assert_eq!(first.scores_for("rmse"), second.scores_for("rmse"));
}

#[test]
fn test_changed_config_is_not_served_from_store() {
    let store = Arc::new(CountingStore::default());
    let ctx = DataContext::new(regression_df(), store.clone());

    fit(&mut regression_config(), &ctx).unwrap();
    let mut ridge = ModelConfig::new(
        ModelSpec::ridge(10.0),
        vec![Feature::column("x1"), Feature::column("x2")],
        Feature::column("target"),
    );
    fit(&mut ridge, &ctx).unwrap();

    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    assert_eq!(store.hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_knn_classifier_stratified_cv() {
    let ctx = DataContext::new(classification_df(), Arc::new(MemoryStore::new()));
    let mut config = ModelConfig::new(
        ModelSpec::knn_classifier(3),
        vec![Feature::column("f1"), Feature::column("f2")],
        Feature::column("target"),
    )
    .with_metrics(vec![Metric::Accuracy]);

    let folds = CrossValidator::new(CVStrategy::StratifiedKFold {
        n_splits: 5,
        shuffle: true,
    })
    .with_random_state(42);

    let result = cv_to(&mut config, &ctx, folds, 1, false, &mut Vec::new()).unwrap();
    let accuracy = result.scores_for("accuracy").unwrap();
    assert_eq!(accuracy.len(), 5);
    assert!(accuracy.iter().all(|a| (0.0..=1.0).contains(a)));
}

#[test]
fn test_group_folds_keep_groups_together() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let config = regression_config();

    let mut folds = CrossValidator::new(CVStrategy::GroupKFold {
        n_splits: 5,
        column: "group".to_string(),
    });
    folds.set_context(&config, &ctx).unwrap();
    let folds = folds.folds().unwrap();
    assert_eq!(folds.len(), 5);

    let groups = ctx.column_values("group").unwrap();
    for fold in &folds {
        for test_row in &fold.test {
            let g = groups.get(*test_row).unwrap();
            assert!(fold.train.iter().all(|r| groups.get(*r).unwrap() != g));
        }
    }
}

#[test]
fn test_predict_with_post_processing() {
    let mut ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()))
        .with_train_index((0..15).collect());

    // fit on sqrt(target), square the raw predictions back
    let mut config = ModelConfig::new(
        ModelSpec::knn_regressor(1),
        vec![Feature::column("x1")],
        Feature::power(Feature::column("target"), 0.5),
    )
    .with_prediction(Feature::power(Feature::column("raw"), 2.0))
    .with_predictions_name("raw");

    let result = predict(&mut config, &mut ctx, &[14, 15], true).unwrap();
    // nearest training row to both is x1 = 15 with target 45
    assert!((result.preds.values[0] - 45.0).abs() < 1e-9);
    assert!((result.preds.values[1] - 45.0).abs() < 1e-9);
    assert_eq!(result.preds.name, "");
    assert!(ctx.data.column("raw").is_ok());
}

#[test]
fn test_predict_new_rows_without_target() {
    let train = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config();
    fit(&mut config, &train).unwrap();

    let scoring = df!("x1" => &[21.0, 22.0], "x2" => &[1.0, 2.0]).unwrap();
    let mut ctx = DataContext::new(scoring, Arc::new(MemoryStore::new()))
        .with_index(vec![100, 101])
        .unwrap();

    let result = predict(&mut config, &mut ctx, &[100, 101], false).unwrap();
    assert!(result.y.is_none());
    assert!((result.preds.values[0] - 63.0).abs() < 1e-6);
    assert!((result.preds.values[1] - 66.0).abs() < 1e-6);
}

#[test]
fn test_missing_feature_column_is_reported() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = ModelConfig::new(
        ModelSpec::linear_regression(),
        vec![Feature::column("nope")],
        Feature::column("target"),
    );
    let err = fit(&mut config, &ctx).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_cv_report_and_printed_results() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config()
        .with_reporter(ReporterKind::ModelSummary.build())
        .with_reporter(ReporterKind::ResidualStats.build());

    let mut out = Vec::new();
    let result = cv_to(&mut config, &ctx, 4usize, 2, true, &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert!(result.report.contains("| ModelSummary"));
    assert!(result.report.contains("models seen: 8"));
    assert!(result.report.contains("| ResidualStats"));
    assert!(printed.contains("features: [x1, x2]"));
    assert!(printed.contains("rmse\n"));
    assert!(printed.contains("r2\n"));

    // reporters start over after each run
    let again = cv_to(&mut config, &ctx, 4usize, 1, false, &mut Vec::new()).unwrap();
    assert!(again.report.contains("models seen: 4"));
}

#[test]
fn test_store_hit_matches_fresh_fit_with_normalized_features() {
    let store = Arc::new(CountingStore::default());
    let mut ctx = DataContext::new(regression_df(), store.clone()).with_train_index((0..15).collect());
    let config = || {
        ModelConfig::new(
            ModelSpec::linear_regression(),
            vec![Feature::normalize(Feature::column("x1"))],
            Feature::column("target"),
        )
    };

    let fresh = predict(&mut config(), &mut ctx, &[15, 16, 17], true).unwrap();
    let cached = predict(&mut config(), &mut ctx, &[15, 16, 17], true).unwrap();
    assert_eq!(store.hits.load(Ordering::SeqCst), 1);

    let expected = [48.0, 51.0, 54.0];
    for i in 0..3 {
        assert!((fresh.preds.values[i] - expected[i]).abs() < 1e-6);
        assert!((cached.preds.values[i] - fresh.preds.values[i]).abs() < 1e-9);
    }
}

#[test]
fn test_scoring_new_rows_reuses_training_normalization() {
    let train = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = ModelConfig::new(
        ModelSpec::linear_regression(),
        vec![Feature::normalize(Feature::column("x1")), Feature::column("x2")],
        Feature::column("target"),
    );
    fit(&mut config, &train).unwrap();

    // two rows alone would normalize to -1 and 1
    let scoring = df!("x1" => &[21.0, 22.0], "x2" => &[1.0, 2.0]).unwrap();
    let mut ctx = DataContext::new(scoring, Arc::new(MemoryStore::new()));

    let result = predict(&mut config, &mut ctx, &[0, 1], false).unwrap();
    assert!((result.preds.values[0] - 63.0).abs() < 1e-6);
    assert!((result.preds.values[1] - 66.0).abs() < 1e-6);
}

#[test]
fn test_group_folds_reject_zero_splits() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config();
    let folds = CrossValidator::new(CVStrategy::GroupKFold {
        n_splits: 0,
        column: "group".to_string(),
    });

    let err = cv_to(&mut config, &ctx, folds, 1, false, &mut Vec::new()).unwrap_err();
    assert!(matches!(err, RampError::ValidationError(_)));
}

/// Generator yielding a single holdout split
struct Holdout {
    labels: Vec<usize>,
}

impl FoldGenerator for Holdout {
    fn set_context(&mut self, _config: &ModelConfig, ctx: &DataContext) -> ramp_ml::Result<()> {
        self.labels = ctx.index.clone();
        Ok(())
    }

    fn folds(&self) -> ramp_ml::Result<Vec<Fold>> {
        let (train, test) = self.labels.split_at(self.labels.len() * 3 / 4);
        Ok(vec![Fold {
            train: train.to_vec(),
            test: test.to_vec(),
        }])
    }
}

#[test]
fn test_custom_generator_with_fewer_folds_than_repeat() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config();
    let folds = Folds::Custom(Box::new(Holdout { labels: Vec::new() }));

    let result = cv_to(&mut config, &ctx, folds, 3, false, &mut Vec::new()).unwrap();
    let rmse = result.scores_for("rmse").unwrap();
    assert_eq!(rmse.len(), 1);
    assert!(rmse[0] < 1e-6);
}

#[test]
fn test_duplicate_metrics_share_one_score_list() {
    let ctx = DataContext::new(regression_df(), Arc::new(MemoryStore::new()));
    let mut config = regression_config().with_metrics(vec![Metric::Rmse, Metric::Rmse]);

    let mut out = Vec::new();
    let result = cv_to(&mut config, &ctx, 4usize, 1, true, &mut out).unwrap();
    assert_eq!(result.scores.len(), 1);
    assert_eq!(result.scores_for("rmse").unwrap().len(), 4);

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed.matches("rmse\n").count(), 1);
}
