use std::sync::Arc;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::domain::{DataPoint, Frequency};
use crate::error::FetchError;
use crate::http_client::{HttpClient, HttpRequest};

/// Economic forecast endpoint: one GET per frequency, keyed by API key.
pub struct ForecastAdapter {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
    breaker: Arc<CircuitBreaker>,
}

impl ForecastAdapter {
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

    /// One forecast fetch attempt. The retry loop lives in the fetcher; this
    /// method classifies its own errors and feeds the circuit breaker.
    pub async fn fetch(&self, frequency: Frequency) -> Result<Vec<DataPoint>, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::missing_credential("forecast api key is not provisioned"))?;

        if !self.breaker.allow_request() {
            return Err(FetchError::transport("forecast circuit breaker is open"));
        }

        let url = format!(
            "{}?api_key={}&frequency={}",
            self.base_url,
            urlencoding::encode(api_key),
            frequency.as_str()
        );
        let request = HttpRequest::get(url).with_timeout_ms(10_000);

        let response = self.http.execute(request).await.map_err(|error| {
            self.breaker.record_failure();
            if error.is_timeout() {
                FetchError::timeout(format!("forecast request timed out: {}", error.message()))
            } else {
                FetchError::transport(format!("forecast transport error: {}", error.message()))
            }
        })?;

        if !response.is_success() {
            self.breaker.record_failure();
            return Err(FetchError::upstream_status(response.status));
        }

        self.breaker.record_success();

        let payload: ForecastResponse = serde_json::from_str(&response.body).map_err(|error| {
            FetchError::protocol(format!("failed to parse forecast response: {error}"))
        })?;

        let mut points = Vec::with_capacity(payload.forecasts.len());
        for row in payload.forecasts {
            match DataPoint::new(row.date, row.value, None) {
                Ok(point) => points.push(point),
                Err(error) => {
                    tracing::debug!(%error, "dropping malformed forecast row");
                }
            }
        }

        Ok(points)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecasts: Vec<ForecastRow>,
}

#[derive(Debug, Deserialize)]
struct ForecastRow {
    date: String,
    value: f64,
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

    #[tokio::test]
    async fn builds_url_with_key_and_frequency() {
        let body = r#"{"forecasts":[{"date":"2026-09-30","value":2.1}]}"#;
        let client = Arc::new(RecordingHttpClient::with_response(Ok(
            HttpResponse::ok_json(body),
        )));
        let adapter = ForecastAdapter::new(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            "https://example.test/forecast",
            Some(String::from("secret key")),
        );

        let points = adapter
            .fetch(Frequency::Quarterly)
            .await
            .expect("fetch should succeed");

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ts, "2026-09-30");
        assert_eq!(points[0].volume, None);

        let urls = client.recorded_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("api_key=secret%20key"));
        assert!(urls[0].contains("frequency=q"));
    }

    #[tokio::test]
    async fn missing_key_is_a_terminal_error() {
        let client = Arc::new(RecordingHttpClient::with_response(Ok(
            HttpResponse::ok_json("{}"),
        )));
        let adapter = ForecastAdapter::new(
            Arc::clone(&client) as Arc<dyn HttpClient>,
            "https://example.test/forecast",
            None,
        );

        let error = adapter
            .fetch(Frequency::Monthly)
            .await
            .expect_err("missing key must fail");

        assert!(!error.retryable());
        assert!(client.recorded_urls().is_empty(), "no request should go out");
    }

    #[tokio::test]
    async fn non_success_status_is_retryable() {
        let client = Arc::new(RecordingHttpClient::with_response(Ok(HttpResponse {
            status: 503,
            body: String::new(),
        })));
        let adapter = ForecastAdapter::new(
            client as Arc<dyn HttpClient>,
            "https://example.test/forecast",
            Some(String::from("key")),
        );

        let error = adapter
            .fetch(Frequency::Quarterly)
            .await
            .expect_err("503 must fail");
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_terminal() {
        let client = Arc::new(RecordingHttpClient::with_response(Ok(
            HttpResponse::ok_json("not json"),
        )));
        let adapter = ForecastAdapter::new(
            client as Arc<dyn HttpClient>,
            "https://example.test/forecast",
            Some(String::from("key")),
        );

        let error = adapter
            .fetch(Frequency::Quarterly)
            .await
            .expect_err("garbage body must fail");
        assert!(!error.retryable());
    }
}
