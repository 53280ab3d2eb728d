//! Per-kind fetch logic.
//!
//! [`SourceFetcher::fetch`] is the error boundary of the acquisition path:
//! whatever the gateway or a REST service does, the caller gets a
//! [`FetchResult`], never an `Err` and never a propagated panic from this
//! code. Each instrument kind has its own handler arm; the match is
//! exhaustive by construction.

use std::sync::Arc;

use crate::adapters::{ForecastAdapter, InterestRateAdapter};
use crate::domain::{
    ContractSpec, DataPoint, EconomicEndpoint, FetchRequest, FetchResult, SeriesKind,
};
use crate::error::FetchError;
use crate::gateway::ConnectionManager;
use crate::retry::{retry, RetryConfig, RetryFailure};

pub struct SourceFetcher {
    connection: Arc<ConnectionManager>,
    forecast: ForecastAdapter,
    rates: InterestRateAdapter,
    retry: RetryConfig,
}

impl SourceFetcher {
    pub fn new(
        connection: Arc<ConnectionManager>,
        forecast: ForecastAdapter,
        rates: InterestRateAdapter,
        retry: RetryConfig,
    ) -> Self {
        Self {
            connection,
            forecast,
            rates,
            retry,
        }
    }

    /// Fetch one source. Empty provider responses and skipped sources come
    /// back as [`FetchResult::Empty`]; every error becomes
    /// [`FetchResult::Failure`] with the attempt count that produced it.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let symbol = &request.source.symbol;
        let outcome = match &request.source.kind {
            SeriesKind::Equity => {
                self.gateway_bars(request, ContractSpec::stock(symbol)).await
            }
            SeriesKind::Future { exchange } => {
                self.gateway_bars(request, ContractSpec::continuous_future(symbol, exchange))
                    .await
            }
            SeriesKind::Forex => {
                self.gateway_bars(request, ContractSpec::cash_pair(symbol)).await
            }
            SeriesKind::EconomicSeries { endpoint } => {
                self.economic_series(request, endpoint).await
            }
        };

        match outcome {
            Ok(points) if points.is_empty() => {
                tracing::warn!(symbol = %symbol, "provider returned no rows");
                FetchResult::Empty
            }
            Ok(points) => {
                tracing::info!(symbol = %symbol, rows = points.len(), "fetch succeeded");
                FetchResult::Success(points)
            }
            Err(failure) => {
                tracing::error!(
                    symbol = %symbol,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "fetch failed; run continues"
                );
                FetchResult::Failure {
                    reason: failure.error.to_string(),
                    attempts: failure.attempts,
                }
            }
        }
    }

    async fn gateway_bars(
        &self,
        request: &FetchRequest,
        spec: ContractSpec,
    ) -> Result<Vec<DataPoint>, RetryFailure> {
        if !self.connection.is_connected() {
            return Err(RetryFailure {
                error: FetchError::not_connected(),
                attempts: 0,
                exhausted: false,
            });
        }

        let gateway = self.connection.gateway();
        let params = &request.source.bars;
        let label = format!("gateway.bars.{}", request.source.symbol);

        let bars = retry(&label, &self.retry, || {
            let spec = spec.clone();
            async move {
                let contract = gateway.resolve(&spec).await?;
                gateway.historical_bars(&contract, params).await
            }
        })
        .await?;

        let mut points = Vec::with_capacity(bars.len());
        for bar in bars {
            match DataPoint::new(bar.ts, bar.close, bar.volume) {
                Ok(point) => points.push(point),
                Err(error) => {
                    tracing::debug!(symbol = %request.source.symbol, %error, "dropping malformed bar");
                }
            }
        }
        Ok(points)
    }

    async fn economic_series(
        &self,
        request: &FetchRequest,
        endpoint: &EconomicEndpoint,
    ) -> Result<Vec<DataPoint>, RetryFailure> {
        let symbol = &request.source.symbol;
        match endpoint {
            EconomicEndpoint::Forecast { frequency } => {
                if self.forecast.api_key().is_none() {
                    tracing::warn!(symbol = %symbol, "forecast api key missing; skipping source");
                    return Ok(Vec::new());
                }
                let label = format!("forecast.{symbol}");
                retry(&label, &self.retry, || self.forecast.fetch(*frequency)).await
            }
            EconomicEndpoint::InterestRate => {
                if self.rates.api_key().is_none() {
                    tracing::warn!(symbol = %symbol, "interest rate api key missing; skipping source");
                    return Ok(Vec::new());
                }
                let label = format!("rates.{symbol}");
                retry(&label, &self.retry, || self.rates.fetch(symbol)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::{DEFAULT_FORECAST_URL, DEFAULT_RATES_URL};
    use crate::domain::{SeriesSource, Symbol};
    use crate::gateway::{GatewayEndpoint, SimulatedGateway};
    use crate::http_client::{HttpClient, NoopHttpClient};

    fn fetcher_with(gateway: Arc<SimulatedGateway>) -> SourceFetcher {
        let connection = Arc::new(ConnectionManager::new(
            gateway,
            GatewayEndpoint::default(),
        ));
        let http: Arc<dyn HttpClient> = Arc::new(NoopHttpClient);
        SourceFetcher::new(
            connection,
            ForecastAdapter::new(Arc::clone(&http), DEFAULT_FORECAST_URL, None),
            InterestRateAdapter::new(http, DEFAULT_RATES_URL, None),
            RetryConfig::fixed(Duration::from_millis(1), 3),
        )
    }

    fn equity_request(symbol: &str, duration: &str) -> FetchRequest {
        let symbol = Symbol::parse(symbol).expect("valid symbol");
        let mut source = SeriesSource::equity(symbol);
        source.bars.duration = duration.to_owned();
        FetchRequest::new(source, "req-test")
    }

    #[tokio::test]
    async fn disconnected_gateway_yields_failure_not_panic() {
        let gateway = Arc::new(SimulatedGateway::new());
        let fetcher = fetcher_with(gateway);

        let result = fetcher.fetch(&equity_request("AAPL", "3 D")).await;
        match result {
            FetchResult::Failure { attempts, .. } => assert_eq!(attempts, 0),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_gateway_faults_are_retried_to_success() {
        let gateway = Arc::new(SimulatedGateway::new());
        gateway.fail_symbol("AAPL", 2);
        let fetcher = fetcher_with(Arc::clone(&gateway));
        fetcher
            .connection
            .connect(&RetryConfig::single_attempt())
            .await
            .expect("connect");

        let result = fetcher.fetch(&equity_request("AAPL", "3 D")).await;
        assert!(result.is_success(), "got {result:?}");
        assert_eq!(result.rows().map(<[DataPoint]>::len), Some(3));
    }

    #[tokio::test]
    async fn empty_provider_response_is_empty_not_failure() {
        let gateway = Arc::new(SimulatedGateway::new());
        gateway.empty_symbol("XYZ");
        let fetcher = fetcher_with(Arc::clone(&gateway));
        fetcher
            .connection
            .connect(&RetryConfig::single_attempt())
            .await
            .expect("connect");

        let result = fetcher.fetch(&equity_request("XYZ", "3 D")).await;
        assert_eq!(result, FetchResult::Empty);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_skip_not_a_failure() {
        let gateway = Arc::new(SimulatedGateway::new());
        let fetcher = fetcher_with(gateway);

        let series = Symbol::parse("DFF").expect("valid series");
        let request = FetchRequest::new(SeriesSource::interest_rate(series), "req-test");
        let result = fetcher.fetch(&request).await;
        assert_eq!(result, FetchResult::Empty);
    }

    #[tokio::test]
    async fn exhausted_fetch_reports_attempt_count() {
        let gateway = Arc::new(SimulatedGateway::new());
        gateway.fail_symbol_always("AAPL");
        let fetcher = fetcher_with(Arc::clone(&gateway));
        fetcher
            .connection
            .connect(&RetryConfig::single_attempt())
            .await
            .expect("connect");

        let result = fetcher.fetch(&equity_request("AAPL", "3 D")).await;
        match result {
            FetchResult::Failure { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
