use std::sync::Arc;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::domain::{DataPoint, Symbol};
use crate::error::FetchError;
use crate::http_client::{HttpClient, HttpRequest};

/// Interest rate observations endpoint, FRED-shaped: one GET per series id.
pub struct InterestRateAdapter {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
    breaker: Arc<CircuitBreaker>,
}

impl InterestRateAdapter {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// One observations fetch attempt for `series`.
    ///
    /// Observations whose value is the service's missing marker (`"."`) are
    /// dropped rather than treated as errors.
    pub async fn fetch(&self, series: &Symbol) -> Result<Vec<DataPoint>, FetchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            FetchError::missing_credential("interest rate api key is not provisioned")
        })?;

        if !self.breaker.allow_request() {
            return Err(FetchError::transport(
                "interest rate circuit breaker is open",
            ));
        }

        let url = format!(
            "{}?series_id={}&api_key={}&file_type=json",
            self.base_url,
            urlencoding::encode(series.as_str()),
            urlencoding::encode(api_key)
        );
        let request = HttpRequest::get(url).with_timeout_ms(10_000);

        let response = self.http.execute(request).await.map_err(|error| {
            self.breaker.record_failure();
            if error.is_timeout() {
                FetchError::timeout(format!(
                    "interest rate request timed out: {}",
                    error.message()
                ))
            } else {
                FetchError::transport(format!(
                    "interest rate transport error: {}",
                    error.message()
                ))
            }
        })?;

        if !response.is_success() {
            self.breaker.record_failure();
            return Err(FetchError::upstream_status(response.status));
        }

        self.breaker.record_success();

        let payload: ObservationsResponse = serde_json::from_str(&response.body).map_err(|error| {
            FetchError::protocol(format!("failed to parse observations response: {error}"))
        })?;

        let mut points = Vec::with_capacity(payload.observations.len());
        for row in payload.observations {
            // "." marks a holiday/unreported observation.
            if row.value.trim() == "." {
                continue;
            }
            let Ok(value) = row.value.trim().parse::<f64>() else {
                tracing::debug!(series = %series, date = %row.date, "dropping unparseable observation");
                continue;
            };
            match DataPoint::new(row.date, value, None) {
                Ok(point) => points.push(point),
                Err(error) => {
                    tracing::debug!(%error, "dropping malformed observation row");
                }
            }
        }

        Ok(points)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::{HttpError, HttpResponse};

    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn with_response(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store is not poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store is not poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn adapter_with(client: Arc<RecordingHttpClient>, key: Option<&str>) -> InterestRateAdapter {
        InterestRateAdapter::new(
            client as Arc<dyn HttpClient>,
            "https://example.test/observations",
            key.map(str::to_owned),
        )
    }

    #[tokio::test]
    async fn builds_url_with_series_key_and_file_type() {
        let body = r#"{"observations":[
            {"date":"2026-02-18","value":"4.33"},
            {"date":"2026-02-19","value":"."},
            {"date":"2026-02-20","value":"4.35"}
        ]}"#;
        let client = Arc::new(RecordingHttpClient::with_response(Ok(
            HttpResponse::ok_json(body),
        )));
        let adapter = adapter_with(Arc::clone(&client), Some("k"));
        let series = Symbol::parse("DFF").expect("valid series");

        let points = adapter.fetch(&series).await.expect("fetch should succeed");

        // The "." observation is dropped, not an error.
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, 4.33);
        assert_eq!(points[1].ts, "2026-02-20");

        let urls = client.recorded_urls();
        assert!(urls[0].contains("series_id=DFF"));
        assert!(urls[0].contains("api_key=k"));
        assert!(urls[0].contains("file_type=json"));
    }

    #[tokio::test]
    async fn auth_status_is_terminal() {
        let client = Arc::new(RecordingHttpClient::with_response(Ok(HttpResponse {
            status: 403,
            body: String::new(),
        })));
        let adapter = adapter_with(client, Some("bad"));
        let series = Symbol::parse("DGS10").expect("valid series");

        let error = adapter.fetch(&series).await.expect_err("403 must fail");
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn transport_error_is_retryable() {
        let client = Arc::new(RecordingHttpClient::with_response(Err(HttpError::new(
            "connection reset",
        ))));
        let adapter = adapter_with(client, Some("k"));
        let series = Symbol::parse("DGS10").expect("valid series");

        let error = adapter.fetch(&series).await.expect_err("must fail");
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn empty_observations_yield_zero_points() {
        let client = Arc::new(RecordingHttpClient::with_response(Ok(
            HttpResponse::ok_json(r#"{"observations":[]}"#),
        )));
        let adapter = adapter_with(client, Some("k"));
        let series = Symbol::parse("DFF").expect("valid series");

        let points = adapter.fetch(&series).await.expect("fetch succeeds");
        assert!(points.is_empty());
    }
}
