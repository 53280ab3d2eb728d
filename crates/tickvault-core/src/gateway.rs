//! Brokerage gateway session lifecycle.
//!
//! The gateway itself is a black box behind [`MarketGateway`]; this module
//! owns the one piece of state the rest of the crate cares about: whether a
//! session is up. [`ConnectionManager`] is the only component that mutates
//! [`ConnectionState`]; fetchers borrow the gateway handle read-only.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use crate::domain::{BarParams, Contract, ContractSpec, HistoricalBar, QuoteField};
use crate::error::{ConnectError, FetchError};
use crate::retry::{retry, RetryConfig};

/// Where the gateway process listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
}

impl Default for GatewayEndpoint {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 4001,
            client_id: 17,
        }
    }
}

/// Session lifecycle state. Exactly one instance exists per run, owned by
/// the [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Brokerage session contract.
///
/// Implementations must make `disconnect` safe to call in any state,
/// including before the first `connect`.
pub trait MarketGateway: Send + Sync {
    fn connect<'a>(
        &'a self,
        endpoint: &'a GatewayEndpoint,
    ) -> Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send + 'a>>;

    fn resolve<'a>(
        &'a self,
        spec: &'a ContractSpec,
    ) -> Pin<Box<dyn Future<Output = Result<Contract, FetchError>> + Send + 'a>>;

    fn historical_bars<'a>(
        &'a self,
        contract: &'a Contract,
        params: &'a BarParams,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoricalBar>, FetchError>> + Send + 'a>>;

    fn disconnect<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Owns the gateway session for one run.
pub struct ConnectionManager {
    gateway: Arc<dyn MarketGateway>,
    endpoint: GatewayEndpoint,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(gateway: Arc<dyn MarketGateway>, endpoint: GatewayEndpoint) -> Self {
        Self {
            gateway,
            endpoint,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self
            .state
            .lock()
            .expect("connection state lock is not poisoned")
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn gateway(&self) -> &Arc<dyn MarketGateway> {
        &self.gateway
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }

    fn set_state(&self, next: ConnectionState) {
        *self
            .state
            .lock()
            .expect("connection state lock is not poisoned") = next;
    }

    /// Drive `Disconnected -> Connecting -> {Connected | Failed}` under the
    /// given retry budget. Exhaustion leaves the manager in terminal
    /// `Failed`; that is the one failure the pipeline does not absorb.
    pub async fn connect(&self, retry_config: &RetryConfig) -> Result<(), ConnectError> {
        let outcome = retry("gateway.connect", retry_config, || {
            self.set_state(ConnectionState::Connecting);
            let gateway = Arc::clone(&self.gateway);
            let endpoint = self.endpoint.clone();
            async move { gateway.connect(&endpoint).await }
        })
        .await;

        match outcome {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                tracing::info!(
                    host = %self.endpoint.host,
                    port = self.endpoint.port,
                    client_id = self.endpoint.client_id,
                    "gateway session established"
                );
                Ok(())
            }
            Err(failure) => {
                self.set_state(ConnectionState::Failed);
                tracing::error!(
                    attempts = failure.attempts,
                    error = %failure.error,
                    "gateway connection budget exhausted"
                );
                Err(ConnectError {
                    attempts: failure.attempts,
                    last: failure.error,
                })
            }
        }
    }

    /// Tear the session down. Safe from any state; the pipeline calls this
    /// exactly once on every exit path.
    pub async fn disconnect(&self) {
        self.gateway.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("gateway session closed");
    }
}

#[derive(Debug, Clone, Default)]
struct SymbolScript {
    fail_remaining: u32,
    fail_always: bool,
    unresolvable: bool,
    empty: bool,
    panic: bool,
    delay: Option<std::time::Duration>,
}

#[derive(Debug, Default)]
struct SimInner {
    connected: bool,
    refuse_connects_remaining: u32,
    connect_attempts: u32,
    disconnect_calls: u32,
    bar_calls: u32,
    scripts: HashMap<String, SymbolScript>,
}

/// Deterministic in-process gateway.
///
/// Stands in for the real brokerage session in the default binary wiring and
/// in tests. Bars are seeded from the symbol so repeated runs produce the
/// same rows, and faults can be scripted per symbol.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    inner: Mutex<SimInner>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `attempts` connection attempts.
    pub fn refuse_connects(&self, attempts: u32) {
        self.lock().refuse_connects_remaining = attempts;
    }

    /// Fail the next `attempts` historical-bar calls for `symbol`.
    pub fn fail_symbol(&self, symbol: &str, attempts: u32) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().fail_remaining = attempts;
    }

    /// Fail every historical-bar call for `symbol`.
    pub fn fail_symbol_always(&self, symbol: &str) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().fail_always = true;
    }

    /// Make contract resolution fail terminally for `symbol`.
    pub fn unresolvable_symbol(&self, symbol: &str) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().unresolvable = true;
    }

    /// Return zero rows for `symbol` without an error.
    pub fn empty_symbol(&self, symbol: &str) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().empty = true;
    }

    /// Panic inside the historical-bar call for `symbol`.
    pub fn panic_on_symbol(&self, symbol: &str) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().panic = true;
    }

    /// Delay every historical-bar call for `symbol`.
    pub fn slow_symbol(&self, symbol: &str, delay: std::time::Duration) {
        self.lock().scripts.entry(symbol.to_owned()).or_default().delay = Some(delay);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.lock().disconnect_calls
    }

    pub fn bar_calls(&self) -> u32 {
        self.lock().bar_calls
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimInner> {
        self.inner
            .lock()
            .expect("simulated gateway lock is not poisoned")
    }
}

impl MarketGateway for SimulatedGateway {
    fn connect<'a>(
        &'a self,
        endpoint: &'a GatewayEndpoint,
    ) -> Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.connect_attempts += 1;
            if inner.refuse_connects_remaining > 0 {
                inner.refuse_connects_remaining -= 1;
                return Err(FetchError::transport(format!(
                    "connection refused by {}:{}",
                    endpoint.host, endpoint.port
                )));
            }
            inner.connected = true;
            Ok(())
        })
    }

    fn resolve<'a>(
        &'a self,
        spec: &'a ContractSpec,
    ) -> Pin<Box<dyn Future<Output = Result<Contract, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let inner = self.lock();
            if !inner.connected {
                return Err(FetchError::not_connected());
            }
            let unresolvable = inner
                .scripts
                .get(&spec.symbol)
                .map(|script| script.unresolvable)
                .unwrap_or(false);
            drop(inner);

            if unresolvable {
                return Err(FetchError::protocol(format!(
                    "no contract matches '{}'",
                    spec.symbol
                )));
            }

            Ok(Contract {
                contract_id: symbol_seed(&spec.symbol) as i64,
                spec: spec.clone(),
            })
        })
    }

    fn historical_bars<'a>(
        &'a self,
        contract: &'a Contract,
        params: &'a BarParams,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoricalBar>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let symbol = contract.spec.symbol.clone();
            let (empty, panic, delay) = {
                let mut inner = self.lock();
                inner.bar_calls += 1;
                if !inner.connected {
                    return Err(FetchError::not_connected());
                }

                let script = inner.scripts.entry(symbol.clone()).or_default();
                if script.fail_always {
                    return Err(FetchError::transport(format!(
                        "historical data farm unavailable for {symbol}"
                    )));
                }
                if script.fail_remaining > 0 {
                    script.fail_remaining -= 1;
                    return Err(FetchError::transport(format!(
                        "historical data request timed out for {symbol}"
                    )));
                }
                (script.empty, script.panic, script.delay)
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if panic {
                panic!("simulated provider fault for {symbol}");
            }
            if empty {
                return Ok(Vec::new());
            }

            let count = bar_count(&params.duration)?;
            Ok(generate_bars(&symbol, params, count))
        })
    }

    fn disconnect<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.disconnect_calls += 1;
            inner.connected = false;
        })
    }
}

/// Number of daily bars implied by a duration string like "30 D" or "1 Y".
fn bar_count(duration: &str) -> Result<usize, FetchError> {
    let mut parts = duration.split_whitespace();
    let amount = parts
        .next()
        .and_then(|raw| raw.parse::<usize>().ok())
        .ok_or_else(|| FetchError::protocol(format!("invalid duration '{duration}'")))?;
    let unit = parts
        .next()
        .ok_or_else(|| FetchError::protocol(format!("invalid duration '{duration}'")))?;

    let per_unit = match unit {
        "D" => 1,
        "W" => 5,
        "M" => 21,
        "Y" => 252,
        _ => {
            return Err(FetchError::protocol(format!(
                "unsupported duration unit '{unit}'"
            )))
        }
    };
    Ok(amount.saturating_mul(per_unit).clamp(1, 2_000))
}

fn generate_bars(symbol: &str, params: &BarParams, count: usize) -> Vec<HistoricalBar> {
    let seed = symbol_seed(symbol);
    let daily = params.bar_size.contains("day");
    let today = OffsetDateTime::now_utc().date();
    let mut bars = Vec::with_capacity(count);

    for index in 0..count {
        let offset_days = (count - index) as i64;
        let date = today - time::Duration::days(offset_days);
        let ts = if daily {
            format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            )
        } else {
            format!(
                "{:04}-{:02}-{:02} 16:00:00",
                date.year(),
                u8::from(date.month()),
                date.day()
            )
        };

        let base = 40.0 + ((seed + index as u64 * 7) % 900) as f64 / 10.0;
        let volume = match params.what_to_show {
            QuoteField::Trades => Some(10_000 + index as u64 * 25),
            _ => None,
        };

        bars.push(HistoricalBar {
            ts,
            open: base,
            high: base + 0.90,
            low: base - 0.60,
            close: base + 0.25,
            volume,
        });
    }

    bars
}

fn symbol_seed(symbol: &str) -> u64 {
    symbol.bytes().fold(11_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(byte as u64)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::Symbol;

    fn manager_with(gateway: Arc<SimulatedGateway>) -> ConnectionManager {
        ConnectionManager::new(gateway, GatewayEndpoint::default())
    }

    #[tokio::test]
    async fn connects_on_third_attempt_within_budget() {
        let gateway = Arc::new(SimulatedGateway::new());
        gateway.refuse_connects(2);
        let manager = manager_with(Arc::clone(&gateway));

        manager
            .connect(&RetryConfig::fixed(Duration::from_millis(1), 3))
            .await
            .expect("third attempt should succeed");

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(gateway.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_is_terminal_failed() {
        let gateway = Arc::new(SimulatedGateway::new());
        gateway.refuse_connects(5);
        let manager = manager_with(Arc::clone(&gateway));

        let error = manager
            .connect(&RetryConfig::fixed(Duration::from_millis(1), 2))
            .await
            .expect_err("budget of 2 cannot reach attempt 3");

        assert_eq!(error.attempts, 2);
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_from_any_state() {
        let gateway = Arc::new(SimulatedGateway::new());
        let manager = manager_with(Arc::clone(&gateway));

        // Never connected; disconnect must still be safe.
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager
            .connect(&RetryConfig::single_attempt())
            .await
            .expect("connect");
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn historical_bars_require_a_session() {
        let gateway = SimulatedGateway::new();
        let symbol = Symbol::parse("AAPL").expect("valid symbol");
        let spec = ContractSpec::stock(&symbol);

        let error = gateway.resolve(&spec).await.expect_err("not connected");
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn generated_bars_are_deterministic_and_ordered() {
        let gateway = SimulatedGateway::new();
        gateway
            .connect(&GatewayEndpoint::default())
            .await
            .expect("connect");

        let symbol = Symbol::parse("MSFT").expect("valid symbol");
        let contract = gateway
            .resolve(&ContractSpec::stock(&symbol))
            .await
            .expect("resolve");
        let params = BarParams::trades();
        let params = BarParams {
            duration: String::from("3 D"),
            ..params
        };

        let first = gateway
            .historical_bars(&contract, &params)
            .await
            .expect("bars");
        let second = gateway
            .historical_bars(&contract, &params)
            .await
            .expect("bars");

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert!(first[0].ts < first[1].ts);
    }

    #[test]
    fn duration_grammar_maps_to_bar_counts() {
        assert_eq!(bar_count("30 D").expect("parses"), 30);
        assert_eq!(bar_count("2 W").expect("parses"), 10);
        assert_eq!(bar_count("1 Y").expect("parses"), 252);
        assert!(bar_count("soon").is_err());
    }
}
