//! Environment-variable configuration.
//!
//! A single invocation performs one acquisition cycle; everything it needs
//! arrives through `TICKVAULT_*` variables, no interactive flags.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TICKVAULT_GATEWAY_HOST` | `127.0.0.1` | Gateway host |
//! | `TICKVAULT_GATEWAY_PORT` | `4001` | Gateway port |
//! | `TICKVAULT_GATEWAY_CLIENT_ID` | `17` | Gateway client id |
//! | `TICKVAULT_EQUITIES` | — | Comma-separated equity symbols |
//! | `TICKVAULT_FUTURES` | — | Comma-separated `SYMBOL:EXCHANGE` pairs |
//! | `TICKVAULT_FOREX` | — | Comma-separated six-letter pairs |
//! | `TICKVAULT_RATE_SERIES` | — | Comma-separated interest-rate series ids |
//! | `TICKVAULT_FORECASTS` | — | Comma-separated `ID:FREQUENCY` entries |
//! | `TICKVAULT_FORECAST_API_KEY` | — | Key for the forecast service |
//! | `TICKVAULT_RATES_API_KEY` | — | Key for the interest-rate service |
//! | `TICKVAULT_FORECAST_URL` | built-in | Forecast base URL override |
//! | `TICKVAULT_RATES_URL` | built-in | Interest-rate base URL override |
//! | `TICKVAULT_DURATION` | `1 Y` | Lookback for gateway-backed sources |
//! | `TICKVAULT_BAR_SIZE` | `1 day` | Bar size for gateway-backed sources |
//! | `TICKVAULT_PARALLELISM` | `4` | Concurrent fetch slots |
//! | `TICKVAULT_CONNECT_ATTEMPTS` | `5` | Gateway connect budget |
//! | `TICKVAULT_CONNECT_BACKOFF_MS` | `3000` | Connect backoff delay |
//! | `TICKVAULT_RETRY_ATTEMPTS` | `3` | Per-fetch attempt budget |
//! | `TICKVAULT_RETRY_BACKOFF_MS` | `2000` | Per-fetch backoff delay |
//! | `TICKVAULT_RUN_DEADLINE_SECS` | none | Overall fetch deadline |
//! | `TICKVAULT_HOME` | `~/.tickvault` | Data directory |
//! | `TICKVAULT_DB_PATH` | `$TICKVAULT_HOME/market.duckdb` | Database file |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tickvault_core::{Frequency, RetryConfig, RunConfig, SeriesSource, Symbol};

use crate::error::CliError;

pub fn config_from_env() -> Result<RunConfig, CliError> {
    let mut config = RunConfig::default();

    if let Some(host) = var("TICKVAULT_GATEWAY_HOST") {
        config.endpoint.host = host;
    }
    if let Some(port) = var("TICKVAULT_GATEWAY_PORT") {
        config.endpoint.port = port
            .parse()
            .map_err(|_| CliError::Config(format!("invalid gateway port '{port}'")))?;
    }
    if let Some(client_id) = var("TICKVAULT_GATEWAY_CLIENT_ID") {
        config.endpoint.client_id = client_id
            .parse()
            .map_err(|_| CliError::Config(format!("invalid gateway client id '{client_id}'")))?;
    }

    for raw in list(&var("TICKVAULT_EQUITIES")) {
        let symbol = parse_symbol(&raw)?;
        config.sources.push(SeriesSource::equity(symbol));
    }

    for raw in list(&var("TICKVAULT_FUTURES")) {
        let (symbol_part, exchange) = match raw.split_once(':') {
            Some((symbol, exchange)) if !exchange.trim().is_empty() => {
                (symbol.to_owned(), exchange.trim().to_owned())
            }
            _ => (raw.clone(), String::from("CME")),
        };
        let symbol = parse_symbol(&symbol_part)?;
        config.sources.push(SeriesSource::future(symbol, exchange));
    }

    for raw in list(&var("TICKVAULT_FOREX")) {
        let symbol = parse_symbol(&raw)?;
        let source = SeriesSource::forex(symbol)
            .map_err(|error| CliError::Config(error.to_string()))?;
        config.sources.push(source);
    }

    for raw in list(&var("TICKVAULT_RATE_SERIES")) {
        let series = parse_symbol(&raw)?;
        config.sources.push(SeriesSource::interest_rate(series));
    }

    for raw in list(&var("TICKVAULT_FORECASTS")) {
        let (id_part, frequency) = match raw.split_once(':') {
            Some((id, frequency)) => {
                let frequency = Frequency::parse(frequency)
                    .map_err(|error| CliError::Config(error.to_string()))?;
                (id.to_owned(), frequency)
            }
            None => (raw.clone(), Frequency::Quarterly),
        };
        let id = parse_symbol(&id_part)?;
        config.sources.push(SeriesSource::forecast(id, frequency));
    }

    if let Some(duration) = var("TICKVAULT_DURATION") {
        for source in &mut config.sources {
            if source.kind.needs_gateway() {
                source.bars.duration = duration.clone();
            }
        }
    }
    if let Some(bar_size) = var("TICKVAULT_BAR_SIZE") {
        for source in &mut config.sources {
            if source.kind.needs_gateway() {
                source.bars.bar_size = bar_size.clone();
            }
        }
    }

    config.forecast.api_key = var("TICKVAULT_FORECAST_API_KEY");
    config.rates.api_key = var("TICKVAULT_RATES_API_KEY");
    if let Some(url) = var("TICKVAULT_FORECAST_URL") {
        config.forecast.base_url = url;
    }
    if let Some(url) = var("TICKVAULT_RATES_URL") {
        config.rates.base_url = url;
    }

    if let Some(parallelism) = var("TICKVAULT_PARALLELISM") {
        config.parallelism = parallelism
            .parse()
            .map_err(|_| CliError::Config(format!("invalid parallelism '{parallelism}'")))?;
    }

    config.connect_retry = RetryConfig::fixed(
        Duration::from_millis(parse_or(
            &var("TICKVAULT_CONNECT_BACKOFF_MS"),
            3_000,
            "TICKVAULT_CONNECT_BACKOFF_MS",
        )?),
        parse_or(
            &var("TICKVAULT_CONNECT_ATTEMPTS"),
            5,
            "TICKVAULT_CONNECT_ATTEMPTS",
        )? as u32,
    );
    config.fetch_retry = RetryConfig::fixed(
        Duration::from_millis(parse_or(
            &var("TICKVAULT_RETRY_BACKOFF_MS"),
            2_000,
            "TICKVAULT_RETRY_BACKOFF_MS",
        )?),
        parse_or(
            &var("TICKVAULT_RETRY_ATTEMPTS"),
            3,
            "TICKVAULT_RETRY_ATTEMPTS",
        )? as u32,
    );

    if let Some(deadline) = var("TICKVAULT_RUN_DEADLINE_SECS") {
        let seconds: u64 = deadline
            .parse()
            .map_err(|_| CliError::Config(format!("invalid run deadline '{deadline}'")))?;
        config.run_deadline = Some(Duration::from_secs(seconds));
    }

    if let Some(db_path) = var("TICKVAULT_DB_PATH") {
        config.store.db_path = PathBuf::from(db_path);
    }

    Ok(config)
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_symbol(raw: &str) -> Result<Symbol, CliError> {
    Symbol::parse(raw).map_err(|error| CliError::Config(format!("invalid symbol '{raw}': {error}")))
}

fn parse_or(value: &Option<String>, default: u64, name: &str) -> Result<u64, CliError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| CliError::Config(format!("invalid {name} value '{raw}'"))),
        None => Ok(default),
    }
}
