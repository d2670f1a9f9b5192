//! Punctuality CLI Module
//!
//! Command-line interface for the full pipeline, single-model tuning and a
//! data summary.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, Resamples};
use crate::preprocessing::PreparedData;
use crate::training::ModelKind;
use crate::utils::{DataLoader, SourceFrames};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "punctuality")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict accrued stop delays of Belgian trains")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Remote CSV export to download
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Local CSV export used instead of the URL
    #[arg(short, long, global = true)]
    pub input: Option<PathBuf>,

    /// JSON configuration file, overridden by the other flags
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for cached tuning artifacts
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory receiving report.md and report.json
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Candidate configurations per model
    #[arg(long, global = true)]
    pub n_configs: Option<usize>,

    /// Cross-validation folds
    #[arg(long, global = true)]
    pub folds: Option<usize>,

    /// Seed for splitting, resampling and tuning
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Tune again even when cached artifacts exist
    #[arg(long, global = true)]
    pub force_retune: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and write the report
    Run,

    /// Tune one model family and write its cached artifacts
    Tune {
        /// Model family (rf, xgb, knn, nnet)
        #[arg(short, long)]
        model: ModelKind,
    },

    /// Load, clean and summarise the data only
    Info,
}

impl CommonArgs {
    /// Defaults, then the JSON file, then the flags
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if let Some(input) = &self.input {
            config = config.with_input(input.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        if let Some(n) = self.n_configs {
            config = config.with_n_configs(n);
        }
        if let Some(n) = self.folds {
            config = config.with_folds(n);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.force_retune {
            config = config.with_force_retune(true);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.common.pipeline_config()?;
    match cli.command {
        Commands::Run => cmd_run(config).await,
        Commands::Tune { model } => cmd_tune(config, model).await,
        Commands::Info => cmd_info(config).await,
    }
}

fn print_banner(config: &PipelineConfig) {
    let source = match &config.source.input {
        Some(path) => path.display().to_string(),
        None => config.source.url.clone(),
    };
    let source = if source.chars().count() > 44 {
        format!("{}…", source.chars().take(43).collect::<String>())
    } else {
        source
    };

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "punctuality".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Source  ", &source));
    line_box(&kv("Folds   ", &config.split.n_folds.to_string()));
    line_box(&kv("Configs ", &config.tuning.n_configs.to_string()));
    line_box(&kv("Seed    ", &config.split.seed.to_string()));
    line_box_empty();
    line_box_bottom();
}

async fn load_frames(config: &PipelineConfig) -> anyhow::Result<SourceFrames> {
    step_run("Loading data");
    let start = Instant::now();
    let frames = DataLoader::from_config(&config.source).load(&config.source).await?;
    step_done(&format!("{} rows in {:.1?}", frames.height(), start.elapsed()));
    Ok(frames)
}

/// Run CPU-bound work off the async runtime
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn print_prepared(prepared: &PreparedData) {
    let c = &prepared.cleaning;
    let f = &prepared.features;
    println!("  {:<28} {}", muted("Raw records"), c.input_rows);
    println!("  {:<28} {} / {}", muted("Repaired departures"), c.repaired, c.repair_targets);
    println!("  {:<28} {}", muted("Pass-through dropped"), c.pass_through_dropped);
    println!("  {:<28} {}", muted("No departure delay"), f.dropped_missing_departure_delay);
    println!("  {:<28} {}", muted("No arrival delay"), f.dropped_missing_arrival_delay);
    println!("  {:<28} {}", muted("Modeling rows"), f.output_rows.to_string().white().bold());
    println!("  {:<28} {:.1}%", muted("Late share"), f.prevalence * 100.0);
    println!("  {:<28} {}", muted("Stations"), f.n_stations);
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_run(config: PipelineConfig) -> anyhow::Result<()> {
    print_banner(&config);
    section("Pipeline");
    let frames = load_frames(&config).await?;

    step_run("Cleaning, tuning four models, evaluating");
    let start = Instant::now();
    let output_dir = config.output.output_dir.clone();
    let pipeline = Pipeline::new(config);
    let report = blocking(move || pipeline.run(&frames)).await?;
    step_done(&format!("{:.1?}", start.elapsed()));

    section("Model comparison");
    for m in &report.comparison {
        let marker = if m.model == report.final_model.model { ok("●") } else { dim("○") };
        println!("  {} {:<24} {}", marker, m.model.label(), format!("{:.4}", m.cv_roc_auc).white());
    }

    section("Test set");
    let fm = &report.final_model;
    let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
    println!("  {:<16} {}", muted("ROC-AUC"), fmt(fm.test.roc_auc).white().bold());
    println!("  {:<16} {}", muted("Sensitivity"), fmt(fm.test.sensitivity).white());
    println!("  {:<16} {}", muted("Specificity"), fmt(fm.test.specificity).white());
    println!("  {:<16} {}", muted("|test - CV|"), fmt(fm.overfit_gap).white());

    let (md, json) = report.write(&output_dir)?;
    println!();
    println!("  {} {}", ok("✓"), md.display());
    println!("  {} {}", ok("✓"), json.display());
    println!();
    Ok(())
}

pub async fn cmd_tune(config: PipelineConfig, model: ModelKind) -> anyhow::Result<()> {
    print_banner(&config);
    section(&format!("Tune {}", model.label()));
    let frames = load_frames(&config).await?;

    step_run(&format!("Tuning {}", model.name().cyan()));
    let start = Instant::now();
    let cache_dir = config.output.cache_dir.clone();
    let pipeline = Pipeline::new(config);
    let artifacts = blocking(move || {
        let prepared = pipeline.prepare(&frames)?;
        let resamples = Resamples::new(&prepared.table, &pipeline.config().split)?;
        let tuner = pipeline.tuner()?;
        pipeline.tune(&tuner, model, &prepared.table, &resamples)
    })
    .await?;
    step_done(&format!("{:.1?}", start.elapsed()));

    println!();
    println!("  {:<6} {:>8} {:>4} {:>9}  {}", muted("rank"), muted("mean"), muted("n"), muted("std_err"), muted("config"));
    for (rank, e) in artifacts.leaderboard.iter().enumerate() {
        println!(
            "  {:<6} {:>8.4} {:>4} {:>9}  {}",
            rank + 1,
            e.mean,
            e.n,
            e.std_err.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v)),
            e.config
        );
    }
    let best: Vec<String> = artifacts
        .best_params
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    println!();
    println!("  {:<16} {}", muted("Best"), best.join(", ").white());
    println!("  {:<16} {}", muted("Cache"), display_dir(&cache_dir));
    println!();
    Ok(())
}

pub async fn cmd_info(config: PipelineConfig) -> anyhow::Result<()> {
    section("Data Info");
    let frames = load_frames(&config).await?;
    let pipeline = Pipeline::new(config);
    let prepared = blocking(move || pipeline.prepare(&frames)).await?;

    println!();
    print_prepared(&prepared);

    section("Accrued delay by train type");
    println!("  {:<16} {:>7} {:>8} {:>8}", muted("Type"), muted("n"), muted("mean"), muted("median"));
    for g in &prepared.features.by_train_type {
        println!("  {:<16} {:>7} {:>8.1} {:>8.1}", g.group, g.n, g.mean, g.median);
    }

    section("Accrued delay by day period");
    println!("  {:<16} {:>7} {:>8} {:>8}", muted("Period"), muted("n"), muted("mean"), muted("median"));
    for g in &prepared.features.by_day_period {
        println!("  {:<16} {:>7} {:>8.1} {:>8.1}", g.group, g.n, g.mean, g.median);
    }
    println!();
    Ok(())
}

fn display_dir(path: &Path) -> String {
    path.display().to_string()
}
