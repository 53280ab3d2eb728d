//! Run configuration assembled by the caller (the CLI reads it from the
//! environment; tests build it directly).

use std::time::Duration;

use tickvault_warehouse::StoreConfig;

use crate::adapters::{DEFAULT_FORECAST_URL, DEFAULT_RATES_URL};
use crate::domain::SeriesSource;
use crate::gateway::GatewayEndpoint;
use crate::retry::RetryConfig;

/// One REST collaborator: where it lives and the key that unlocks it.
/// A missing key downgrades its sources to logged skips.
#[derive(Debug, Clone)]
pub struct RestEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RestEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }
}

/// Everything one acquisition cycle needs, owned and immutable for the run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: GatewayEndpoint,
    pub sources: Vec<SeriesSource>,
    /// Budget for establishing the gateway session. Exhaustion is fatal.
    pub connect_retry: RetryConfig,
    /// Budget for each individual source fetch.
    pub fetch_retry: RetryConfig,
    pub parallelism: usize,
    /// Optional overall deadline for the fetch phase.
    pub run_deadline: Option<Duration>,
    pub store: StoreConfig,
    pub forecast: RestEndpoint,
    pub rates: RestEndpoint,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: GatewayEndpoint::default(),
            sources: Vec::new(),
            connect_retry: RetryConfig::fixed(Duration::from_secs(3), 5),
            fetch_retry: RetryConfig::fixed(Duration::from_secs(2), 3),
            parallelism: 4,
            run_deadline: None,
            store: StoreConfig::default(),
            forecast: RestEndpoint::new(DEFAULT_FORECAST_URL, None),
            rates: RestEndpoint::new(DEFAULT_RATES_URL, None),
        }
    }
}
