//! End-to-end tests: local export in, report out

mod common;

use punctuality::cli::CommonArgs;
use punctuality::config::PipelineConfig;
use punctuality::optimizer::ArtifactCache;
use punctuality::evaluation::select_best;
use punctuality::explainability::ImportanceMethod;
use punctuality::pipeline::{Pipeline, Resamples};
use punctuality::training::ModelKind;
use punctuality::utils::DataLoader;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_pipeline_produces_complete_report() {
    let dir = TempDir::new().unwrap();
    let mut config = common::small_config(dir.path());
    config.tuning.n_configs = 2;
    let frames = common::frames(240, 41);

    let pipeline = Pipeline::new(config.clone());
    let report = pipeline.run(&frames).unwrap();

    assert_eq!(report.comparison.len(), 4);
    assert_eq!(report.leaderboards.len(), 4);
    assert_eq!(report.roc_overlay.len(), 4);
    for w in report.comparison.windows(2) {
        assert!(w[0].cv_roc_auc >= w[1].cv_roc_auc);
    }
    assert_eq!(report.final_model.model, report.comparison[0].model);

    assert_eq!(report.split.n_train + report.split.n_test, report.features.output_rows);
    assert_eq!(report.error_analysis.n_test, report.split.n_test);
    assert_eq!(report.importance.entries.len(), 4);
    if matches!(report.importance.method, ImportanceMethod::Native) {
        let total: f64 = report.importance.entries.iter().map(|e| e.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
    assert_eq!(report.run.n_folds, 3);

    let cache = ArtifactCache::new(&config.output.cache_dir);
    for kind in ModelKind::ALL {
        assert!(cache.exists(kind), "{} not cached", kind);
    }

    let (md, json) = report.write(&config.output.output_dir).unwrap();
    let markdown = fs::read_to_string(md).unwrap();
    assert!(markdown.contains(report.final_model.model.label()));
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
    assert!(value.get("final_model").is_some());
    assert_eq!(value["comparison"].as_array().unwrap().len(), 4);
}

#[test]
fn test_second_run_reuses_cache() {
    let dir = TempDir::new().unwrap();
    let mut config = common::small_config(dir.path());
    config.tuning.n_configs = 2;
    let frames = common::frames(200, 42);

    let first = Pipeline::new(config.clone()).run(&frames).unwrap();
    let second = Pipeline::new(config).run(&frames).unwrap();
    assert_eq!(first.comparison, second.comparison);
    assert_eq!(first.final_model.model, second.final_model.model);
}

#[test]
fn test_final_fit_shares_the_tuning_pool() {
    let dir = TempDir::new().unwrap();
    let mut config = common::small_config(dir.path());
    config.tuning.n_configs = 2;
    let frames = common::frames(200, 44);

    let pipeline = Pipeline::new(config);
    let report = pipeline.run(&frames).unwrap();

    let prepared = pipeline.prepare(&frames).unwrap();
    let resamples = Resamples::new(&prepared.table, &pipeline.config().split).unwrap();
    let tuner = pipeline.tuner().unwrap();
    assert_eq!(tuner.n_threads(), 2);

    let artifacts = ModelKind::ALL
        .iter()
        .map(|&kind| pipeline.tune(&tuner, kind, &prepared.table, &resamples).unwrap())
        .collect::<Vec<_>>();
    let best = select_best(&artifacts).unwrap();
    let (finalised, importance) = pipeline
        .finalise(&tuner, best, &prepared.table, &resamples)
        .unwrap();

    assert_eq!(finalised.evaluation, report.final_model);
    assert_eq!(importance, report.importance);
}

#[test]
fn test_empty_table_is_an_error() {
    let csv = format!("{}\n", common::HEADER);
    let frames = DataLoader::new().parse(csv.as_bytes()).unwrap();
    let dir = TempDir::new().unwrap();
    let result = Pipeline::new(common::small_config(dir.path())).prepare(&frames);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_reads_local_input() {
    let dir = TempDir::new().unwrap();
    let config = common::small_config(dir.path());
    fs::write(dir.path().join("export.csv"), common::export_csv(30, 43)).unwrap();

    let frames = DataLoader::from_config(&config.source)
        .load(&config.source)
        .await
        .unwrap();
    assert_eq!(frames.height(), 33);
}

// ============================================================================
// Configuration layering
// ============================================================================

#[test]
fn test_flags_override_json_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("config.json");
    let base = PipelineConfig::default().with_folds(5).with_n_configs(20);
    fs::write(&file, serde_json::to_string(&base).unwrap()).unwrap();

    let args = CommonArgs {
        config: Some(file),
        n_configs: Some(4),
        seed: Some(99),
        force_retune: true,
        ..Default::default()
    };
    let config = args.pipeline_config().unwrap();
    assert_eq!(config.split.n_folds, 5);
    assert_eq!(config.tuning.n_configs, 4);
    assert_eq!(config.split.seed, 99);
    assert_eq!(config.tuning.random_state, 99);
    assert!(config.output.force_retune);
}

#[test]
fn test_invalid_flags_are_rejected() {
    let args = CommonArgs {
        folds: Some(1),
        ..Default::default()
    };
    assert!(args.pipeline_config().is_err());

    let args = CommonArgs {
        url: Some("ftp://example.org/data.csv".to_string()),
        ..Default::default()
    };
    assert!(args.pipeline_config().is_err());
}
