//! ramp - Main Entry Point
//!
//! Fits, predicts with and cross-validates declarative model
//! configurations from the command line.

use clap::Parser;
use ramp_ml::cli::{cmd_cv, cmd_fit, cmd_info, cmd_predict, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ramp_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fit { config, data, store } => {
            cmd_fit(&config, &data, &store)?;
        }
        Commands::Predict { config, train, data, store, output } => {
            cmd_predict(&config, &train, &data, &store, output.as_deref())?;
        }
        Commands::Cv { config, data, folds, repeat, seed, store } => {
            cmd_cv(&config, &data, folds, repeat, seed, &store)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
