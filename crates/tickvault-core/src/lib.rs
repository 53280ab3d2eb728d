//! # Tickvault Core
//!
//! Concurrent acquisition orchestrator for market and macroeconomic time
//! series. One invocation performs one batch cycle: connect to the brokerage
//! gateway, fan out fetches across every configured source, fan the results
//! back in keyed by source identity, and persist them idempotently —
//! tolerating partial source failures without aborting the run.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | REST collaborators (economic forecasts, interest rates) |
//! | [`circuit_breaker`] | Circuit breaker guarding the REST adapters |
//! | [`config`] | Run configuration assembled by the caller |
//! | [`domain`] | Domain models (sources, requests, results, data points) |
//! | [`error`] | Error types and retryability classification |
//! | [`fetch`] | Per-kind fetch logic and the error conversion boundary |
//! | [`gateway`] | Gateway session lifecycle and the provider trait |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`orchestrator`] | Bounded concurrent fan-out / keyed fan-in |
//! | [`pipeline`] | Top-level cycle with guaranteed cleanup |
//! | [`retry`] | Bounded retry with fixed or exponential backoff |
//!
//! ## Failure taxonomy
//!
//! - **Fatal**: the gateway connection exhausts its retry budget. The run
//!   halts with a nonzero status; nothing gateway-backed is persisted.
//! - **Recoverable-transient**: network/timeout/upstream-status errors are
//!   retried with backoff and, on exhaustion, become per-source `Failure`
//!   results. The run continues.
//! - **Soft-empty**: zero rows, or a missing REST API key, produce `Empty`
//!   results and a warning.
//! - **Persistence errors** are isolated per source batch.
//!
//! Errors never cross the fetcher boundary as panics or `Err` values; the
//! orchestrator's result map always contains exactly one entry per request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tickvault_core::{
//!     Pipeline, RunConfig, SeriesSource, SimulatedGateway, Symbol,
//!     http_client::ReqwestHttpClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = RunConfig::default();
//!     config.sources.push(SeriesSource::equity(Symbol::parse("AAPL")?));
//!
//!     let pipeline = Pipeline::new(
//!         config,
//!         Arc::new(SimulatedGateway::new()),
//!         Arc::new(ReqwestHttpClient::new()),
//!     );
//!     let report = pipeline.execute().await?;
//!     println!("wrote {} rows", report.rows_written);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod http_client;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;

// Re-export commonly used types at crate root for convenience

// Adapters
pub use adapters::{ForecastAdapter, InterestRateAdapter, DEFAULT_FORECAST_URL, DEFAULT_RATES_URL};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{RestEndpoint, RunConfig};

// Domain models
pub use domain::{
    BarParams, Contract, ContractSpec, DataPoint, EconomicEndpoint, FetchRequest, FetchResult,
    Frequency, HistoricalBar, QuoteField, SecurityType, SeriesKind, SeriesSource, Symbol,
};

// Error types
pub use error::{ConnectError, FetchError, FetchErrorKind, PipelineError, ValidationError};

// Fetch boundary
pub use fetch::SourceFetcher;

// Gateway lifecycle
pub use gateway::{
    ConnectionManager, ConnectionState, GatewayEndpoint, MarketGateway, SimulatedGateway,
};

// HTTP transport
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};

// Orchestration and pipeline
pub use orchestrator::Orchestrator;
pub use pipeline::{OutcomeStatus, Pipeline, RunReport, SourceOutcome};

// Retry primitives
pub use retry::{retry, Backoff, RetryConfig, RetryFailure};

// Store (re-exported from tickvault-warehouse)
pub use tickvault_warehouse::{MarketRow, MarketStore, StoreConfig, StoreError};
