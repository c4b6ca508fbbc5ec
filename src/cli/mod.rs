//! ramp CLI Module
//!
//! Command-line interface for fitting, predicting and cross-validating
//! model configurations against a data file.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ModelConfig;
use crate::context::DataContext;
use crate::store::DiskStore;
use crate::training::{self, CVStrategy, CrossValidator, Folds};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
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
#[command(name = "ramp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declarative feature engineering and model evaluation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a model configuration on every row of a data file
    Fit {
        /// Model configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input data file (CSV, TSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Directory of the fitted model store
        #[arg(short, long, default_value = ".ramp")]
        store: PathBuf,
    },

    /// Fit on training data, then predict for another data file
    Predict {
        /// Model configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Training data file
        #[arg(short, long)]
        train: PathBuf,

        /// Data file to score
        #[arg(short, long)]
        data: PathBuf,

        /// Directory of the fitted model store
        #[arg(short, long, default_value = ".ramp")]
        store: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cross-validate a model configuration
    Cv {
        /// Model configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Number of folds per round
        #[arg(long, default_value = "5")]
        folds: usize,

        /// Number of rounds, each with a fresh shuffle
        #[arg(long, default_value = "1")]
        repeat: usize,

        /// Seed for fold shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Directory of the fitted model store
        #[arg(short, long, default_value = ".ramp")]
        store: PathBuf,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    Ok(DataLoader::new().load_auto(path)?)
}

fn load_context(data_path: &Path, store_dir: &Path) -> anyhow::Result<DataContext> {
    step_run("Loading data");
    let start = Instant::now();
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let store = DiskStore::new(store_dir)?;
    Ok(DataContext::new(df, Arc::new(store)))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_fit(config_path: &Path, data_path: &Path, store_dir: &Path) -> anyhow::Result<()> {
    section("Fit");

    let mut config = ModelConfig::from_json_file(config_path)?;
    let ctx = load_context(data_path, store_dir)?;

    step_run(&format!("Fitting {}", config.model.to_string().cyan()));
    let start = Instant::now();
    training::fit(&mut config, &ctx)?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(model) = &config.fitted {
        println!();
        for line in model.describe().lines() {
            println!("  {}", line);
        }
    }
    println!();

    Ok(())
}

pub fn cmd_predict(
    config_path: &Path,
    train_path: &Path,
    data_path: &Path,
    store_dir: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let mut config = ModelConfig::from_json_file(config_path)?;
    let train_ctx = load_context(train_path, store_dir)?;

    step_run(&format!("Fitting {}", config.model.to_string().cyan()));
    training::fit(&mut config, &train_ctx)?;
    step_done("");

    let mut ctx = load_context(data_path, store_dir)?;
    let index = ctx.index.clone();

    step_run("Predicting");
    let start = Instant::now();
    let result = training::predict(&mut config, &mut ctx, &index, false)?;
    step_done(&format!("{} rows in {:?}", result.preds.len(), start.elapsed()));

    let rows: Vec<u64> = result.preds.index.iter().map(|&i| i as u64).collect();
    let mut df = df!(
        "row" => rows,
        "prediction" => result.preds.values.to_vec()
    )?;

    match output {
        Some(path) => {
            DataSaver::save_auto(&mut df, path)?;
            step_ok(&format!("Saved → {}", path.display()));
        }
        None => {
            println!();
            println!("  {:>8} {:>14}", muted("row"), muted("prediction"));
            println!("  {}", dim(&"─".repeat(23)));
            for (row, value) in result.preds.index.iter().zip(result.preds.values.iter()).take(20) {
                println!("  {:>8} {:>14.4}", row, value);
            }
            if result.preds.len() > 20 {
                println!("  {}", dim(&format!("… {} more", result.preds.len() - 20)));
            }
        }
    }
    println!();

    Ok(())
}

pub fn cmd_cv(
    config_path: &Path,
    data_path: &Path,
    n_folds: usize,
    repeat: usize,
    seed: Option<u64>,
    store_dir: &Path,
) -> anyhow::Result<()> {
    section("Cross-validate");

    let mut config = ModelConfig::from_json_file(config_path)?;
    let ctx = load_context(data_path, store_dir)?;

    let folds = match seed {
        Some(seed) => Folds::from(
            CrossValidator::new(CVStrategy::RepeatedKFold {
                n_splits: n_folds,
                n_repeats: repeat,
            })
            .with_random_state(seed),
        ),
        None => Folds::Count(n_folds),
    };

    println!();
    let start = Instant::now();
    let result = training::cv(&mut config, &ctx, folds, repeat, false)?;

    println!();
    for line in result.config.lines() {
        println!("  {}", muted(line));
    }

    println!();
    println!("  {:<12} {}", muted("Metric"), muted("Mean (+/- std) [min,max]"));
    println!("  {}", dim(&"─".repeat(50)));
    for scores in &result.scores {
        println!("  {:<12} {}", scores.metric, scores.summary().to_string().white().bold());
    }
    println!();
    step_ok(&format!("{} folds in {:?}", n_folds * repeat.max(1), start.elapsed()));
    println!();

    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_data(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}
