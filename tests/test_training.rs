//! Integration tests for splitting, resampling and the four workflows

mod common;

use punctuality::preprocessing::{prepare, ModelingTable};
use punctuality::training::{
    initial_split, resolve_splits, roc_auc, CVStrategy, CrossValidator, GradientBoostingConfig,
    KNNConfig, MLPConfig, MaxFeatures, ModelKind, ModelSpec, Workflow, WeightKernel,
};
use std::collections::HashSet;

fn table(n: usize, seed: u64) -> ModelingTable {
    prepare(&common::frames(n, seed)).unwrap().table
}

fn specs() -> Vec<ModelSpec> {
    vec![
        ModelSpec::RandomForest {
            trees: 60,
            min_n: 4,
            mtry: MaxFeatures::Fixed(2),
            seed: 11,
        },
        ModelSpec::XGBoost(GradientBoostingConfig {
            n_estimators: 60,
            learning_rate: 0.1,
            max_depth: 3,
            random_state: Some(11),
            ..Default::default()
        }),
        ModelSpec::Knn(KNNConfig {
            n_neighbors: 9,
            distance_power: 2.0,
            kernel: WeightKernel::Triangular,
        }),
        ModelSpec::NeuralNet(MLPConfig {
            hidden_units: 5,
            max_epochs: 200,
            random_state: 11,
            ..Default::default()
        }),
    ]
}

// ============================================================================
// Splitting
// ============================================================================

#[test]
fn test_initial_split_is_stratified() {
    let table = table(400, 21);
    let y = table.all_labels();
    let split = initial_split(&y, 0.75, 42).unwrap();

    assert_eq!(split.n_train() + split.n_test(), table.len());
    let train: HashSet<usize> = split.train_indices.iter().copied().collect();
    assert!(split.test_indices.iter().all(|i| !train.contains(i)));

    let late = |rows: &[usize]| rows.iter().filter(|&&i| table.records[i].is_late).count() as f64;
    let train_share = late(&split.train_indices) / split.n_train() as f64;
    let test_share = late(&split.test_indices) / split.n_test() as f64;
    assert!((train_share - test_share).abs() < 0.05);
}

#[test]
fn test_initial_split_is_reproducible() {
    let y = table(200, 22).all_labels();
    let a = initial_split(&y, 0.75, 9).unwrap();
    let b = initial_split(&y, 0.75, 9).unwrap();
    assert_eq!(a.train_indices, b.train_indices);
    assert_eq!(a.test_indices, b.test_indices);
}

#[test]
fn test_folds_cover_training_rows_once() {
    let table = table(300, 23);
    let split = initial_split(&table.all_labels(), 0.75, 42).unwrap();
    let positions = CrossValidator::new(CVStrategy::KFold { n_splits: 10, shuffle: true })
        .with_random_state(42)
        .split(split.n_train(), None)
        .unwrap();
    let folds = resolve_splits(&positions, &split.train_indices);

    assert_eq!(folds.len(), 10);
    let mut held_out: Vec<usize> = folds.iter().flat_map(|f| f.test_indices.clone()).collect();
    held_out.sort_unstable();
    assert_eq!(held_out, split.train_indices);

    let test: HashSet<usize> = split.test_indices.iter().copied().collect();
    for fold in &folds {
        assert!(fold.train_indices.iter().all(|i| !test.contains(i)));
        assert_eq!(fold.train_indices.len() + fold.test_indices.len(), split.n_train());
    }
}

// ============================================================================
// Workflows
// ============================================================================

#[test]
fn test_every_workflow_beats_chance_on_holdout() {
    let table = table(600, 24);
    let split = initial_split(&table.all_labels(), 0.75, 42).unwrap();
    let y_test = table.labels(&split.test_indices);

    for spec in specs() {
        let kind = spec.kind();
        let fitted = Workflow::new(spec).fit(&table, &split.train_indices).unwrap();
        assert_eq!(fitted.kind(), kind);

        let proba = fitted.predict_proba(&table, &split.test_indices).unwrap();
        assert_eq!(proba.len(), split.n_test());
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));

        let auc = roc_auc(&y_test, &proba).unwrap();
        assert!(auc > 0.6, "{} auc {}", kind, auc);
    }
}

#[test]
fn test_native_importance_only_for_trees() {
    let table = table(200, 25);
    let rows: Vec<usize> = (0..table.len()).collect();

    for spec in specs() {
        let kind = spec.kind();
        let fitted = Workflow::new(spec).fit(&table, &rows).unwrap();
        match kind {
            ModelKind::RandomForest | ModelKind::XGBoost => {
                let importance = fitted.native_importance().unwrap();
                let names: HashSet<&str> = importance.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names.len(), 4);
                assert!(names.contains("train_type"));
                let total: f64 = importance.iter().map(|(_, v)| v).sum();
                assert!((total - 1.0).abs() < 1e-9, "{} importances sum to {}", kind, total);
            }
            ModelKind::Knn | ModelKind::NeuralNet => assert!(fitted.native_importance().is_none()),
        }
    }
}

#[test]
fn test_model_kind_names_parse_back() {
    for kind in ModelKind::ALL {
        assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
    }
    assert!("svm".parse::<ModelKind>().is_err());
}
