use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use burn::config::Config;
use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

use segval::{
    backend::{create_device, EvalBackend, BACKEND_NAME},
    evaluate::run_evaluation,
    EvalConfig,
};

#[derive(Parser, Debug)]
#[command(name = "segval")]
#[command(about = "Evaluate a semantic-segmentation checkpoint: mIoU, accuracy and kappa")]
struct Args {
    /// Evaluation configuration file (JSON).
    #[arg(short, long)]
    config: PathBuf,

    /// Trained weights file; derived from save_dir and train.iters
    /// when omitted.
    #[arg(short, long)]
    model_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    let filter = if std::env::var("RUST_LOG").is_err() {
        filter.add_directive(LevelFilter::INFO.into())
    } else {
        filter
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = EvalConfig::load(&args.config)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("failed to load config file '{}'", args.config.display()))?;

    let device = create_device();
    tracing::info!(backend = BACKEND_NAME, "selected backend");

    run_evaluation::<EvalBackend>(&config, args.model_path, &device)?;
    Ok(())
}
