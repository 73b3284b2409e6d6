//! SMCA model runner
//!
//! Reads the criterion rasters listed in a JSON model config, combines them
//! and writes the composite raster.
//!
//! Usage:
//!   smca --config model.json [--output out.asc] [--profile dem.asc] [--policy invert-cost] [--sequential]
//!
//! Log level via RUST_LOG (default: smca_scorer_rust=info,warn).

use clap::Parser;
use smca_scorer_rust::{run_model, AsciiGrid, ModelConfig, NormalizationPolicy};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "smca", about = "Spatial multi-criteria analysis over aligned rasters")]
struct Cli {
    /// Model configuration (JSON)
    #[arg(short, long, env = "SMCA_CONFIG")]
    config: PathBuf,

    /// Output raster path (overrides the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template raster for the output profile (overrides the config)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Normalization policy (overrides the config)
    #[arg(short, long, value_enum)]
    policy: Option<NormalizationPolicy>,

    /// Combine on a single thread
    #[arg(long)]
    sequential: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smca_scorer_rust=info,smca=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ModelConfig::load(&cli.config)?;
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(profile) = cli.profile {
        config.profile_from = None;
        config.profile_path = Some(profile);
    }
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }
    if cli.sequential {
        config.parallel = false;
    }

    tracing::info!(
        "Running SMCA: {} criteria, policy {}, output {:?}",
        config.criteria.len(), config.policy, config.output
    );

    let summary = run_model(&config, &AsciiGrid, &AsciiGrid)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Composite written: {:?}", summary.output);
        println!("  Shape: {} rows x {} cols", summary.shape.0, summary.shape.1);
        if let (Some(min), Some(max), Some(mean)) = (summary.stats.min, summary.stats.max, summary.stats.mean) {
            println!("  Range: {:.6} .. {:.6} (mean {:.6})", min, max, mean);
        }
        if summary.stats.invalid_cells > 0 {
            println!("  Nodata cells: {}", summary.stats.invalid_cells);
        }
        for c in &summary.contributions {
            println!(
                "  {:<16} weight {:<8} {:?}",
                c.name, c.summary.weight, c.summary.transform
            );
        }
    }

    Ok(())
}
