//! Top-level acquisition cycle.
//!
//! The pipeline owns the run-scoped context: gateway connection, fetcher,
//! orchestrator, and store handle all live here and are passed down
//! explicitly. `execute` has a single guaranteed-release point — the gateway
//! disconnect runs on every exit path, and the store handle drops when the
//! cycle body returns, whatever the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use tickvault_warehouse::{MarketRow, MarketStore};

use crate::adapters::{ForecastAdapter, InterestRateAdapter};
use crate::config::RunConfig;
use crate::domain::{FetchRequest, FetchResult, Symbol};
use crate::error::PipelineError;
use crate::fetch::SourceFetcher;
use crate::gateway::{ConnectionManager, MarketGateway};
use crate::http_client::HttpClient;
use crate::orchestrator::Orchestrator;

/// Outcome class for one source in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Persisted,
    Empty,
    FetchFailed,
    PersistFailed,
}

/// Per-source line in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub status: OutcomeStatus,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final status report for one acquisition cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub duration_ms: u64,
    pub rows_written: usize,
    pub empty_sources: usize,
    pub fetch_failures: usize,
    pub persist_failures: usize,
    pub sources: BTreeMap<String, SourceOutcome>,
}

impl RunReport {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_owned(),
            started_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .expect("utc timestamp is RFC3339 formattable"),
            duration_ms: 0,
            rows_written: 0,
            empty_sources: 0,
            fetch_failures: 0,
            persist_failures: 0,
            sources: BTreeMap::new(),
        }
    }

    fn record_persisted(&mut self, symbol: &Symbol, rows: usize) {
        self.rows_written += rows;
        self.sources.insert(
            symbol.to_string(),
            SourceOutcome {
                status: OutcomeStatus::Persisted,
                rows,
                attempts: None,
                detail: None,
            },
        );
    }

    fn record_empty(&mut self, symbol: &Symbol) {
        self.empty_sources += 1;
        self.sources.insert(
            symbol.to_string(),
            SourceOutcome {
                status: OutcomeStatus::Empty,
                rows: 0,
                attempts: None,
                detail: None,
            },
        );
    }

    fn record_fetch_failure(&mut self, symbol: &Symbol, reason: String, attempts: u32) {
        self.fetch_failures += 1;
        self.sources.insert(
            symbol.to_string(),
            SourceOutcome {
                status: OutcomeStatus::FetchFailed,
                rows: 0,
                attempts: Some(attempts),
                detail: Some(reason),
            },
        );
    }

    fn record_persist_failure(&mut self, symbol: &Symbol, rows: usize, detail: String) {
        self.persist_failures += 1;
        self.sources.insert(
            symbol.to_string(),
            SourceOutcome {
                status: OutcomeStatus::PersistFailed,
                rows,
                attempts: None,
                detail: Some(detail),
            },
        );
    }

    /// True when every source either persisted rows or came back empty.
    pub fn fully_succeeded(&self) -> bool {
        self.fetch_failures == 0 && self.persist_failures == 0
    }
}

pub struct Pipeline {
    config: RunConfig,
    connection: Arc<ConnectionManager>,
    fetcher: Arc<SourceFetcher>,
    orchestrator: Orchestrator,
    run_id: String,
}

impl Pipeline {
    pub fn new(
        config: RunConfig,
        gateway: Arc<dyn MarketGateway>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(gateway, config.endpoint.clone()));
        let forecast = ForecastAdapter::new(
            Arc::clone(&http),
            config.forecast.base_url.clone(),
            config.forecast.api_key.clone(),
        );
        let rates = InterestRateAdapter::new(
            http,
            config.rates.base_url.clone(),
            config.rates.api_key.clone(),
        );
        let fetcher = Arc::new(SourceFetcher::new(
            Arc::clone(&connection),
            forecast,
            rates,
            config.fetch_retry.clone(),
        ));
        let orchestrator = Orchestrator::new(config.parallelism, config.run_deadline);
        let run_id = format!("run-{}", Uuid::new_v4());

        Self {
            config,
            connection,
            fetcher,
            orchestrator,
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Run one acquisition cycle.
    ///
    /// Per-source fetch and persist failures are folded into the report and
    /// do not fail the run. Only two things do: the gateway connection
    /// exhausting its budget, and the store refusing to open.
    pub async fn execute(&self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();

        let outcome = self.run_cycle().await;

        // Guaranteed release: the one disconnect of the run, on every path.
        self.connection.disconnect().await;

        let mut report = outcome?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %report.run_id,
            rows = report.rows_written,
            empty = report.empty_sources,
            fetch_failures = report.fetch_failures,
            persist_failures = report.persist_failures,
            "acquisition cycle finished"
        );
        Ok(report)
    }

    async fn run_cycle(&self) -> Result<RunReport, PipelineError> {
        // The store handle lives exactly as long as this body; it is
        // released when the cycle returns, success or not.
        let store = MarketStore::open(self.config.store.clone())?;

        self.connection.connect(&self.config.connect_retry).await?;

        let requests: Vec<FetchRequest> = self
            .config
            .sources
            .iter()
            .map(|source| FetchRequest::new(source.clone(), self.run_id.clone()))
            .collect();
        tracing::info!(
            run_id = %self.run_id,
            sources = requests.len(),
            "starting acquisition cycle"
        );

        let results = self
            .orchestrator
            .run(Arc::clone(&self.fetcher), requests)
            .await;

        let mut report = RunReport::new(&self.run_id);
        for (symbol, result) in results {
            match result {
                FetchResult::Success(points) => {
                    let rows: Vec<MarketRow> = points
                        .iter()
                        .map(|point| MarketRow {
                            symbol: symbol.to_string(),
                            date: point.ts.clone(),
                            close: point.close,
                            volume: point.volume,
                        })
                        .collect();
                    match store.persist(symbol.as_str(), &self.run_id, &rows) {
                        Ok(written) => report.record_persisted(&symbol, written),
                        Err(error) => {
                            tracing::error!(
                                symbol = %symbol,
                                %error,
                                "persist failed; other sources continue"
                            );
                            report.record_persist_failure(&symbol, rows.len(), error.to_string());
                        }
                    }
                }
                FetchResult::Empty => report.record_empty(&symbol),
                FetchResult::Failure { reason, attempts } => {
                    report.record_fetch_failure(&symbol, reason, attempts);
                }
            }
        }

        Ok(report)
    }
}
