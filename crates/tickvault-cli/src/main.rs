mod cli;
mod env;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tickvault_core::http_client::ReqwestHttpClient;
use tickvault_core::{MarketGateway, Pipeline, SimulatedGateway};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "acquisition run failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let _cli = Cli::parse();

    let config = env::config_from_env()?;
    if config.sources.is_empty() {
        return Err(CliError::Config(String::from(
            "no sources configured; set TICKVAULT_EQUITIES, TICKVAULT_FUTURES, \
             TICKVAULT_FOREX, TICKVAULT_RATE_SERIES, or TICKVAULT_FORECASTS",
        )));
    }

    // The gateway protocol itself is an external collaborator; the bundled
    // session is the deterministic in-process one. A production deployment
    // supplies its own MarketGateway implementation here.
    let gateway: Arc<dyn MarketGateway> = Arc::new(SimulatedGateway::new());
    let pipeline = Pipeline::new(config, gateway, Arc::new(ReqwestHttpClient::new()));

    let report = pipeline.execute().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    // Partial source failures are reported, not fatal.
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}
