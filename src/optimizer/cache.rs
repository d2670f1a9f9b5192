//! On-disk tuning artifacts: best parameters, ROC curve and leaderboard as CSV

use crate::error::{PunctualityError, Result};
use crate::training::{CVSplit, ModelKind, RocPoint};
use super::config::OptimizationConfig;
use super::optimizer::{BestParams, LeaderboardEntry, TuningArtifacts};
use super::search_space::{SearchSpace, TrialParams};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const MISSING: &str = "NA";

/// Search settings the cached artifacts were produced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningFingerprint {
    pub n_configs: usize,
    pub seed: u64,
    pub sampler: String,
    pub n_folds: usize,
    /// Rows assessed across all folds, i.e. the training partition size
    pub n_rows: usize,
}

impl TuningFingerprint {
    pub fn new(config: &OptimizationConfig, folds: &[CVSplit]) -> Self {
        Self {
            n_configs: config.n_configs,
            seed: config.random_state,
            sampler: config.sampler.name().to_string(),
            n_folds: folds.len(),
            n_rows: folds.iter().map(|f| f.test_indices.len()).sum(),
        }
    }
}

/// Directory holding `<model>_best_params.csv`, `<model>_roc_curve.csv`
/// and `<model>_leaderboard.csv` per model family, plus the
/// `<model>_fingerprint.csv` of the search that wrote them
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn best_params_path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(format!("{}_best_params.csv", kind.name()))
    }

    pub fn roc_curve_path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(format!("{}_roc_curve.csv", kind.name()))
    }

    pub fn leaderboard_path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(format!("{}_leaderboard.csv", kind.name()))
    }

    pub fn fingerprint_path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(format!("{}_fingerprint.csv", kind.name()))
    }

    /// Record the settings behind the model's artifacts
    pub fn save_fingerprint(&self, kind: ModelKind, fingerprint: &TuningFingerprint) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut writer = WriterBuilder::new().from_path(self.fingerprint_path(kind))?;
        writer.serialize(fingerprint)?;
        writer.flush()?;
        Ok(())
    }

    /// Settings behind the model's artifacts, `None` when never recorded
    pub fn fingerprint(&self, kind: ModelKind) -> Result<Option<TuningFingerprint>> {
        let path = self.fingerprint_path(kind);
        if !path.is_file() {
            return Ok(None);
        }
        let mut reader = ReaderBuilder::new()
            .from_path(&path)
            .map_err(|e| cache_error(&path, e.to_string()))?;
        let row = reader
            .deserialize::<TuningFingerprint>()
            .next()
            .ok_or_else(|| cache_error(&path, "no data row"))?
            .map_err(|e| cache_error(&path, e.to_string()))?;
        Ok(Some(row))
    }

    /// True when all three files of a model exist
    pub fn exists(&self, kind: ModelKind) -> bool {
        self.best_params_path(kind).is_file()
            && self.roc_curve_path(kind).is_file()
            && self.leaderboard_path(kind).is_file()
    }

    /// Write the three files, replacing earlier ones
    pub fn save(&self, artifacts: &TuningArtifacts) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let kind = artifacts.model;
        let names = kind.search_space().param_names();

        let path = self.best_params_path(kind);
        let mut writer = WriterBuilder::new().from_path(&path)?;
        let mut header = names.clone();
        header.push(".config".to_string());
        writer.write_record(&header)?;
        let mut row = param_fields(&names, &artifacts.best_params.params, &path)?;
        row.push(artifacts.best_params.config.clone());
        writer.write_record(&row)?;
        writer.flush()?;

        let mut writer = WriterBuilder::new().from_path(self.roc_curve_path(kind))?;
        writer.write_record([".threshold", "specificity", "sensitivity"])?;
        for p in &artifacts.roc_curve {
            writer.write_record([
                p.threshold.to_string(),
                p.specificity.to_string(),
                p.sensitivity.to_string(),
            ])?;
        }
        writer.flush()?;

        let path = self.leaderboard_path(kind);
        let mut writer = WriterBuilder::new().from_path(&path)?;
        let mut header = names.clone();
        header.extend([".metric", ".estimator", "mean", "n", "std_err", ".config"].map(String::from));
        writer.write_record(&header)?;
        for entry in &artifacts.leaderboard {
            let mut row = param_fields(&names, &entry.params, &path)?;
            row.extend([
                entry.metric.clone(),
                entry.estimator.clone(),
                entry.mean.to_string(),
                entry.n.to_string(),
                entry.std_err.map_or_else(|| MISSING.to_string(), |v| v.to_string()),
                entry.config.clone(),
            ]);
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!(model = kind.name(), dir = %self.dir.display(), "Saved tuning artifacts");
        Ok(())
    }

    /// Read the three files of a model back
    pub fn load(&self, kind: ModelKind) -> Result<TuningArtifacts> {
        let space = kind.search_space();

        let path = self.best_params_path(kind);
        let table = CsvTable::read(&path)?;
        let first = table.rows.first().ok_or_else(|| cache_error(&path, "no data row"))?;
        let best_params = BestParams {
            params: table.params(&space, first)?,
            config: table.field(first, ".config")?.to_string(),
        };

        let path = self.roc_curve_path(kind);
        let table = CsvTable::read(&path)?;
        let roc_curve = table
            .rows
            .iter()
            .map(|row| {
                Ok(RocPoint {
                    threshold: table.number(row, ".threshold")?,
                    specificity: table.number(row, "specificity")?,
                    sensitivity: table.number(row, "sensitivity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let path = self.leaderboard_path(kind);
        let table = CsvTable::read(&path)?;
        let leaderboard = table
            .rows
            .iter()
            .map(|row| {
                let std_err = match table.field(row, "std_err")? {
                    MISSING => None,
                    _ => Some(table.number(row, "std_err")?),
                };
                Ok(LeaderboardEntry {
                    params: table.params(&space, row)?,
                    metric: table.field(row, ".metric")?.to_string(),
                    estimator: table.field(row, ".estimator")?.to_string(),
                    mean: table.number(row, "mean")?,
                    n: table
                        .field(row, "n")?
                        .parse::<usize>()
                        .map_err(|_| cache_error(&table.path, "column n is not a count"))?,
                    std_err,
                    config: table.field(row, ".config")?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(model = kind.name(), dir = %self.dir.display(), "Loaded cached tuning artifacts");
        Ok(TuningArtifacts {
            model: kind,
            best_params,
            roc_curve,
            leaderboard,
        })
    }
}

fn cache_error(path: &Path, reason: impl Into<String>) -> PunctualityError {
    PunctualityError::CacheError {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn param_fields(names: &[String], params: &TrialParams, path: &Path) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| {
            params
                .get(name)
                .map(|v| v.to_string())
                .ok_or_else(|| cache_error(path, format!("parameter '{}' missing from artifacts", name)))
        })
        .collect()
}

/// A whole CSV file with header lookup
struct CsvTable {
    path: PathBuf,
    header: StringRecord,
    rows: Vec<StringRecord>,
}

impl CsvTable {
    fn read(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .from_path(path)
            .map_err(|e| cache_error(path, e.to_string()))?;
        let header = reader.headers()?.clone();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    fn field<'a>(&self, row: &'a StringRecord, column: &str) -> Result<&'a str> {
        self.header
            .iter()
            .position(|h| h == column)
            .and_then(|i| row.get(i))
            .ok_or_else(|| cache_error(&self.path, format!("column '{}' missing", column)))
    }

    fn number(&self, row: &StringRecord, column: &str) -> Result<f64> {
        self.field(row, column)?
            .parse()
            .map_err(|_| cache_error(&self.path, format!("column '{}' is not numeric", column)))
    }

    fn params(&self, space: &SearchSpace, row: &StringRecord) -> Result<TrialParams> {
        space
            .parameters()
            .iter()
            .map(|p| Ok((p.name.clone(), p.parse_value(self.field(row, &p.name)?)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    fn artifacts() -> TuningArtifacts {
        let mut params = TrialParams::new();
        params.insert("neighbors".to_string(), ParameterValue::Int(7));
        params.insert("weight_func".to_string(), ParameterValue::String("triweight".to_string()));
        params.insert("dist_power".to_string(), ParameterValue::Float(1.371_234_567_8));

        TuningArtifacts {
            model: ModelKind::Knn,
            best_params: BestParams {
                params: params.clone(),
                config: "Config012".to_string(),
            },
            roc_curve: vec![
                RocPoint { threshold: f64::NEG_INFINITY, specificity: 0.0, sensitivity: 1.0 },
                RocPoint { threshold: 0.25, specificity: 0.6, sensitivity: 0.9 },
                RocPoint { threshold: f64::INFINITY, specificity: 1.0, sensitivity: 0.0 },
            ],
            leaderboard: vec![
                LeaderboardEntry {
                    params: params.clone(),
                    metric: "roc_auc".to_string(),
                    estimator: "binary".to_string(),
                    mean: 0.734_567,
                    n: 10,
                    std_err: Some(0.004_2),
                    config: "Config012".to_string(),
                },
                LeaderboardEntry {
                    params,
                    metric: "roc_auc".to_string(),
                    estimator: "binary".to_string(),
                    mean: 0.7,
                    n: 1,
                    std_err: None,
                    config: "Config003".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        assert!(!cache.exists(ModelKind::Knn));

        let original = artifacts();
        cache.save(&original).unwrap();
        assert!(cache.exists(ModelKind::Knn));
        assert!(!cache.exists(ModelKind::RandomForest));

        let loaded = cache.load(ModelKind::Knn).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.cv_roc_auc(), Some(0.734_567));
    }

    #[test]
    fn test_file_headers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.save(&artifacts()).unwrap();

        let roc = fs::read_to_string(cache.roc_curve_path(ModelKind::Knn)).unwrap();
        assert!(roc.starts_with(".threshold,specificity,sensitivity\n"));
        assert!(roc.contains("-inf,0,1"));

        let board = fs::read_to_string(cache.leaderboard_path(ModelKind::Knn)).unwrap();
        let header = board.lines().next().unwrap();
        assert_eq!(
            header,
            "neighbors,weight_func,dist_power,.metric,.estimator,mean,n,std_err,.config"
        );
        assert!(board.contains(",NA,Config003"));
    }

    #[test]
    fn test_fingerprint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        assert_eq!(cache.fingerprint(ModelKind::Knn).unwrap(), None);

        let fingerprint = TuningFingerprint {
            n_configs: 100,
            seed: 42,
            sampler: "latin_hypercube".to_string(),
            n_folds: 10,
            n_rows: 1500,
        };
        cache.save_fingerprint(ModelKind::Knn, &fingerprint).unwrap();
        assert_eq!(cache.fingerprint(ModelKind::Knn).unwrap(), Some(fingerprint));
        assert_eq!(cache.fingerprint(ModelKind::NeuralNet).unwrap(), None);

        let text = fs::read_to_string(cache.fingerprint_path(ModelKind::Knn)).unwrap();
        assert!(text.starts_with("n_configs,seed,sampler,n_folds,n_rows\n"));
    }

    #[test]
    fn test_missing_column_is_a_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.save(&artifacts()).unwrap();
        fs::write(cache.best_params_path(ModelKind::Knn), "neighbors,.config\n7,Config012\n").unwrap();

        let err = cache.load(ModelKind::Knn).unwrap_err();
        assert!(matches!(err, PunctualityError::CacheError { .. }));
    }
}
