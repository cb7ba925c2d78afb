//! Cohort parameter-set simulator - Entry Point
//!
//! Runs several simulated market-making configurations side by side against
//! one live order book and prints the ranked comparison.

use anyhow::Result;
use clap::Parser;
use cohort_app::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use cohort_app::{AppConfig, Application, RunOptions};
use cohort_core::ParameterSetProvider;
use std::time::Duration;
use tracing::info;

/// Cohort parameter-set simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via COHORT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Parameter set to run (repeatable). Defaults to every configured set.
    #[arg(short = 'p', long = "param-set")]
    param_sets: Vec<String>,

    /// Stop automatically after this many minutes. 0 runs until Ctrl-C.
    #[arg(short, long, default_value_t = 0)]
    duration_minutes: u64,

    /// Run id. A UUID is generated when omitted.
    #[arg(long)]
    run_id: Option<String>,

    /// Print the configured parameter sets and exit.
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    cohort_telemetry::init_logging()?;

    info!("Starting cohort-sim v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > COHORT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;
    info!(
        symbol = %config.feed.symbol,
        info_url = %config.feed.info_url,
        parameter_sets = config.parameter_sets.len(),
        "Configuration loaded"
    );

    if args.list {
        let sets = config.parameter_sets()?.list();
        println!("{}", serde_json::to_string_pretty(&sets)?);
        return Ok(());
    }

    let app = Application::new(config)?;
    let options = RunOptions {
        parameter_set_ids: args.param_sets,
        duration: Duration::from_secs(args.duration_minutes.saturating_mul(60)),
        run_id: args.run_id,
    };

    let comparison = app.run(options).await?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);

    Ok(())
}
