//! Integration tests for the hyperparameter search and its artifact cache

mod common;

use punctuality::optimizer::{ArtifactCache, OptimizationConfig, Tuner, TuningFingerprint};
use punctuality::pipeline::Resamples;
use punctuality::preprocessing::{prepare, ModelingTable};
use punctuality::training::ModelKind;
use tempfile::TempDir;

fn setup(n: usize) -> (ModelingTable, Resamples) {
    let table = prepare(&common::frames(n, 31)).unwrap().table;
    let config = punctuality::config::SplitConfig {
        train_fraction: 0.75,
        n_folds: 3,
        seed: 5,
    };
    let resamples = Resamples::new(&table, &config).unwrap();
    (table, resamples)
}

fn optimization(n_configs: usize) -> OptimizationConfig {
    OptimizationConfig::new()
        .with_n_configs(n_configs)
        .with_threads(2)
        .with_random_state(5)
}

fn tuner(n_configs: usize) -> Tuner {
    Tuner::new(optimization(n_configs)).unwrap()
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_knn_leaderboard_is_ranked() {
    let (table, resamples) = setup(160);
    let artifacts = tuner(6).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();

    assert_eq!(artifacts.model, ModelKind::Knn);
    assert!(!artifacts.leaderboard.is_empty());
    assert!(artifacts.leaderboard.len() <= 5);
    for w in artifacts.leaderboard.windows(2) {
        assert!(w[0].mean >= w[1].mean);
    }

    let top = &artifacts.leaderboard[0];
    assert_eq!(top.config, artifacts.best_params.config);
    assert_eq!(top.params, artifacts.best_params.params);
    assert_eq!(top.metric, "roc_auc");
    assert!(top.n <= 3);
    assert_eq!(artifacts.cv_roc_auc(), Some(top.mean));
    assert!(artifacts.roc_curve.len() >= 2);
}

#[test]
fn test_same_seed_same_design() {
    let (table, resamples) = setup(120);
    let a = tuner(3).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();
    let b = tuner(3).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();
    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.leaderboard.len(), b.leaderboard.len());
}

#[test]
fn test_best_spec_rebuilds_winner() {
    let (table, resamples) = setup(120);
    let artifacts = tuner(3).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();
    let spec = artifacts.best_spec(5).unwrap();
    assert_eq!(spec.kind(), ModelKind::Knn);
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn test_cache_round_trip() {
    let dir = TempDir::new().unwrap();
    let (table, resamples) = setup(120);
    let cache = ArtifactCache::new(dir.path());
    let artifacts = tuner(3).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();

    assert!(!cache.exists(ModelKind::Knn));
    cache.save(&artifacts).unwrap();
    assert!(cache.exists(ModelKind::Knn));
    assert!(cache.best_params_path(ModelKind::Knn).exists());
    assert!(cache.roc_curve_path(ModelKind::Knn).exists());
    assert!(cache.leaderboard_path(ModelKind::Knn).exists());

    let loaded = cache.load(ModelKind::Knn).unwrap();
    assert_eq!(loaded.best_params, artifacts.best_params);
    assert_eq!(loaded.leaderboard, artifacts.leaderboard);
    assert_eq!(loaded.roc_curve, artifacts.roc_curve);
}

#[test]
fn test_tune_or_load_prefers_matching_cache() {
    let dir = TempDir::new().unwrap();
    let (table, resamples) = setup(120);
    let cache = ArtifactCache::new(dir.path());

    let first = tuner(3)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert!(cache.exists(ModelKind::Knn));
    assert_eq!(
        cache.fingerprint(ModelKind::Knn).unwrap(),
        Some(TuningFingerprint::new(&optimization(3), &resamples.folds))
    );

    // shrink the stored leaderboard so a load is told apart from a re-tune
    let mut marked = first.clone();
    marked.leaderboard.truncate(1);
    cache.save(&marked).unwrap();

    let second = tuner(3)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert_eq!(second.leaderboard, marked.leaderboard);

    let forced = tuner(3)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, true)
        .unwrap();
    assert_eq!(forced.leaderboard, first.leaderboard);
}

#[test]
fn test_tune_or_load_retunes_on_changed_settings() {
    let dir = TempDir::new().unwrap();
    let (table, resamples) = setup(120);
    let cache = ArtifactCache::new(dir.path());

    let first = tuner(3)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert!(first.leaderboard.len() > 1);

    // design size
    let smaller = tuner(1)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert_eq!(smaller.leaderboard.len(), 1);
    assert_eq!(cache.fingerprint(ModelKind::Knn).unwrap().unwrap().n_configs, 1);

    // seed
    let reseeded = Tuner::new(optimization(1).with_random_state(6)).unwrap();
    reseeded
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert_eq!(cache.fingerprint(ModelKind::Knn).unwrap().unwrap().seed, 6);

    // folds
    let fewer_folds = &resamples.folds[..2];
    reseeded
        .tune_or_load(ModelKind::Knn, &table, fewer_folds, &cache, false)
        .unwrap();
    let stored = cache.fingerprint(ModelKind::Knn).unwrap().unwrap();
    assert_eq!(stored.n_folds, 2);
    assert_eq!(stored, TuningFingerprint::new(&optimization(1).with_random_state(6), fewer_folds));
}

#[test]
fn test_cache_without_fingerprint_is_retuned() {
    let dir = TempDir::new().unwrap();
    let (table, resamples) = setup(120);
    let cache = ArtifactCache::new(dir.path());

    let mut stale = tuner(3).tune(ModelKind::Knn, &table, &resamples.folds).unwrap();
    stale.leaderboard.truncate(1);
    cache.save(&stale).unwrap();
    assert_eq!(cache.fingerprint(ModelKind::Knn).unwrap(), None);

    let loaded = tuner(3)
        .tune_or_load(ModelKind::Knn, &table, &resamples.folds, &cache, false)
        .unwrap();
    assert!(loaded.leaderboard.len() > 1);
    assert!(cache.fingerprint(ModelKind::Knn).unwrap().is_some());
}
