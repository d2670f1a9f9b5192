//! Rendered analysis report (Markdown and JSON)

use crate::error::Result;
use crate::evaluation::{DelaySummary, ErrorAnalysis, FinalEvaluation, ModelComparison, OverlayCurve};
use crate::explainability::ImportanceResult;
use crate::optimizer::{LeaderboardEntry, TuningArtifacts};
use crate::preprocessing::{CleaningReport, FeatureReport, GroupSummary, LATE_THRESHOLD_SECS};
use crate::training::ModelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Widest bar of a text histogram
const BAR_WIDTH: usize = 40;

/// Run settings echoed in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: String,
    pub seed: u64,
    pub n_folds: usize,
    pub n_configs: usize,
    pub train_fraction: f64,
}

/// Sizes and label balance of the two partitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub n_train: usize,
    pub n_test: usize,
    pub train_prevalence: f64,
    pub test_prevalence: f64,
}

/// Top configurations of one model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLeaderboard {
    pub model: ModelKind,
    pub entries: Vec<LeaderboardEntry>,
}

impl ModelLeaderboard {
    pub fn from_artifacts(artifacts: &TuningArtifacts) -> Self {
        Self {
            model: artifacts.model,
            entries: artifacts.leaderboard.clone(),
        }
    }
}

/// Everything the pipeline reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub run: RunSummary,
    pub cleaning: CleaningReport,
    pub features: FeatureReport,
    pub split: SplitSummary,
    pub comparison: Vec<ModelComparison>,
    pub leaderboards: Vec<ModelLeaderboard>,
    pub roc_overlay: Vec<OverlayCurve>,
    pub final_model: FinalEvaluation,
    pub importance: ImportanceResult,
    pub error_analysis: ErrorAnalysis,
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

fn pct(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

fn group_table(md: &mut String, title: &str, rows: &[GroupSummary]) {
    md.push_str(&format!("| {} | n | mean | Q1 | median | Q3 |\n", title));
    md.push_str("|---|---:|---:|---:|---:|---:|\n");
    for g in rows {
        md.push_str(&format!(
            "| {} | {} | {:.1} | {:.1} | {:.1} | {:.1} |\n",
            g.group, g.n, g.mean, g.q1, g.median, g.q3
        ));
    }
    md.push('\n');
}

fn text_histogram(md: &mut String, summary: &DelaySummary) {
    let max = summary.histogram.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    md.push_str("```text\n");
    for bin in &summary.histogram {
        let bar = "#".repeat((bin.count * BAR_WIDTH).div_ceil(max).min(BAR_WIDTH));
        md.push_str(&format!("[{:>5.0}, {:>4.0}) {:>6} {}\n", bin.lower, bin.upper, bin.count, bar));
    }
    md.push_str("```\n\n");
}

fn delay_row(md: &mut String, label: &str, s: &DelaySummary) {
    md.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        label,
        s.n,
        fmt_opt(s.mean, 1),
        fmt_opt(s.q1, 1),
        fmt_opt(s.median, 1),
        fmt_opt(s.q3, 1),
        s.share_negative.map_or_else(|| "n/a".to_string(), pct),
    ));
}

impl Report {
    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Belgian train punctuality: predicting accrued stop delay\n\n");
        md.push_str(&format!("*Generated: {}*\n\n", self.generated_at.format("%Y-%m-%d %H:%M UTC")));
        md.push_str(&format!("- **Source:** {}\n", self.run.source));
        md.push_str(&format!(
            "- **Label:** late when accrued delay at a stop exceeds {} s\n",
            LATE_THRESHOLD_SECS
        ));
        md.push_str(&format!(
            "- **Resampling:** {:.0}/{:.0} stratified split, {}-fold cross-validation, seed {}\n",
            self.run.train_fraction * 100.0,
            (1.0 - self.run.train_fraction) * 100.0,
            self.run.n_folds,
            self.run.seed
        ));
        md.push_str(&format!(
            "- **Search:** {} Latin hypercube configurations per model, ranked by ROC-AUC\n\n",
            self.run.n_configs
        ));

        md.push_str("## Data\n\n");
        let c = &self.cleaning;
        md.push_str("| Step | Rows |\n|---|---:|\n");
        md.push_str(&format!("| Raw records | {} |\n", c.input_rows));
        md.push_str(&format!("| Malformed planned departures | {} |\n", c.repair_targets));
        md.push_str(&format!("| Repaired | {} |\n", c.repaired));
        md.push_str(&format!("| Left unrepaired | {} |\n", c.unrepairable));
        md.push_str(&format!("| Pass-through records dropped | {} |\n", c.pass_through_dropped));
        md.push_str(&format!("| Stopping records | {} |\n", c.output_rows));
        let f = &self.features;
        md.push_str(&format!("| Dropped, no departure delay | {} |\n", f.dropped_missing_departure_delay));
        md.push_str(&format!("| Dropped, no arrival delay | {} |\n", f.dropped_missing_arrival_delay));
        md.push_str(&format!("| Dropped, no planned departure | {} |\n", f.dropped_missing_planned_departure));
        md.push_str(&format!("| Modeling rows | {} |\n\n", f.output_rows));
        md.push_str(&format!(
            "{} of {} modeling rows are late ({}), over {} stations. Rows without a departure delay \
             are destination stops and leave the table entirely.\n\n",
            f.late_rows,
            f.output_rows,
            pct(f.prevalence),
            f.n_stations
        ));

        md.push_str("### Accrued delay (s) by train type\n\n");
        group_table(&mut md, "Train type", &f.by_train_type);
        md.push_str("### Accrued delay (s) by day period\n\n");
        group_table(&mut md, "Day period", &f.by_day_period);

        md.push_str("## Resampling\n\n");
        md.push_str(&format!(
            "- **Training rows:** {} ({} late)\n- **Test rows:** {} ({} late)\n\n",
            self.split.n_train,
            pct(self.split.train_prevalence),
            self.split.n_test,
            pct(self.split.test_prevalence)
        ));

        md.push_str("## Model comparison\n\n");
        md.push_str("| Model | CV ROC-AUC | Best configuration |\n|---|---:|---|\n");
        for m in &self.comparison {
            md.push_str(&format!("| {} | {:.4} | {} |\n", m.model.label(), m.cv_roc_auc, m.best_config));
        }
        md.push('\n');

        for board in &self.leaderboards {
            md.push_str(&format!("### {} leaderboard\n\n", board.model.label()));
            let names: Vec<String> = board
                .entries
                .first()
                .map(|e| e.params.keys().cloned().collect())
                .unwrap_or_default();
            md.push_str(&format!("| {} | mean | n | std_err | config |\n", names.join(" | ")));
            md.push_str(&format!("|{}---:|---:|---:|---|\n", "---|".repeat(names.len())));
            for e in &board.entries {
                let values: Vec<String> = names
                    .iter()
                    .map(|n| e.params.get(n).map(|v| v.to_string()).unwrap_or_default())
                    .collect();
                md.push_str(&format!(
                    "| {} | {:.4} | {} | {} | {} |\n",
                    values.join(" | "),
                    e.mean,
                    e.n,
                    fmt_opt(e.std_err, 4),
                    e.config
                ));
            }
            md.push('\n');
        }

        md.push_str("### Cross-validated ROC curves (sensitivity by specificity)\n\n");
        md.push_str("| Specificity |");
        for curve in &self.roc_overlay {
            md.push_str(&format!(" {} |", curve.model.name()));
        }
        md.push_str("\n|---:|");
        md.push_str(&"---:|".repeat(self.roc_overlay.len()));
        md.push('\n');
        let n_points = self.roc_overlay.first().map_or(0, |c| c.points.len());
        for i in 0..n_points {
            let spec = self.roc_overlay[0].points[i].specificity;
            md.push_str(&format!("| {:.2} |", spec));
            for curve in &self.roc_overlay {
                md.push_str(&format!(
                    " {} |",
                    fmt_opt(curve.points.get(i).map(|p| p.sensitivity), 3)
                ));
            }
            md.push('\n');
        }
        md.push('\n');

        let fm = &self.final_model;
        md.push_str(&format!("## Final model: {}\n\n", fm.model.label()));
        let params: Vec<String> = fm.best_params.iter().map(|(k, v)| format!("{} = {}", k, v)).collect();
        md.push_str(&format!("- **Hyperparameters:** {} ({})\n", params.join(", "), fm.best_config));
        md.push_str(&format!("- **CV ROC-AUC:** {:.4}\n", fm.cv_roc_auc));
        md.push_str(&format!("- **Test ROC-AUC:** {}\n", fmt_opt(fm.test.roc_auc, 4)));
        md.push_str(&format!(
            "- **Sensitivity / specificity at {}:** {} / {}\n",
            fm.test.threshold,
            fmt_opt(fm.test.sensitivity, 4),
            fmt_opt(fm.test.specificity, 4)
        ));
        md.push_str(&format!("- **|test - CV| ROC-AUC:** {}\n\n", fmt_opt(fm.overfit_gap, 4)));

        md.push_str(&format!("### Predictor importance ({})\n\n", self.importance.method.as_str()));
        md.push_str("| Predictor | Importance |\n|---|---:|\n");
        for e in &self.importance.entries {
            md.push_str(&format!("| {} | {:.4} |\n", e.predictor, e.importance));
        }
        md.push('\n');

        let ea = &self.error_analysis;
        md.push_str("## Missed late stops\n\n");
        md.push_str(&format!(
            "{} of {} test rows are false negatives. Arrival delays within [{:.0}, {:.0}] s \
             ({} rows outside the window):\n\n",
            ea.n_false_negatives,
            ea.n_test,
            crate::evaluation::DELAY_IN_WINDOW.0,
            crate::evaluation::DELAY_IN_WINDOW.1,
            ea.n_outside_window
        ));
        md.push_str("| Group | n | mean | Q1 | median | Q3 | early arrivals |\n|---|---:|---:|---:|---:|---:|---:|\n");
        delay_row(&mut md, "False negatives", &ea.false_negatives);
        delay_row(&mut md, "Other test rows", &ea.others);
        md.push('\n');
        md.push_str("### delay_in of false negatives\n\n");
        text_histogram(&mut md, &ea.false_negatives);
        md.push_str("### delay_in of other test rows\n\n");
        text_histogram(&mut md, &ea.others);

        md
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `report.md` and `report.json` into `dir`
    pub fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;
        let md_path = dir.join("report.md");
        let json_path = dir.join("report.json");
        fs::write(&md_path, self.to_markdown())?;
        fs::write(&json_path, self.to_json()?)?;
        info!(markdown = %md_path.display(), json = %json_path.display(), "Report written");
        Ok((md_path, json_path))
    }
}
