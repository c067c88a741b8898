use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::info;

mod config;
mod dlmm;
mod errors;
mod models;
mod pipeline;
mod position;
mod pricing;
mod report;
mod solana;
mod throttle;
mod utils;

/// Audits Meteora DLMM LP position submissions for reward program
/// eligibility
#[derive(Debug, Parser)]
#[command(name = "meteora-lp-audit", version, about)]
struct Args {
    /// Input CSV of submissions (overrides DATA_FILE)
    #[arg(long)]
    data_file: Option<String>,

    /// Output CSV path (overrides OUT_FILE)
    #[arg(long)]
    out_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables
    dotenv().ok();

    // Initialize logging
    init_logger();

    info!("Starting Meteora LP audit...");

    let args = Args::parse();
    let mut config = config::load_config()?;
    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }
    if let Some(out_file) = args.out_file {
        config.out_file = out_file;
    }
    info!("Configuration loaded");

    let summary = pipeline::run(config).await?;

    info!(
        "Done: {} row(s), {} usable signature(s), {} position(s) found, {} valid submission(s), {} with api errors",
        summary.total_rows,
        summary.valid_signatures,
        summary.positions_found,
        summary.valid_submissions,
        summary.api_errors
    );
    Ok(())
}

fn init_logger() {
    env_logger::init_from_env(env_logger::Env::default().filter_or("RUST_LOG", "info"));
}
