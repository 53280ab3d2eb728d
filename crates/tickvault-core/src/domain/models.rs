use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Reporting frequency for economic forecast requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "d",
            Self::Weekly => "w",
            Self::Monthly => "m",
            Self::Quarterly => "q",
            Self::Annual => "a",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "daily" => Ok(Self::Daily),
            "w" | "weekly" => Ok(Self::Weekly),
            "m" | "monthly" => Ok(Self::Monthly),
            "q" | "quarterly" => Ok(Self::Quarterly),
            "a" | "annual" => Ok(Self::Annual),
            other => Err(ValidationError::InvalidFrequency {
                value: other.to_owned(),
            }),
        }
    }
}

/// Which price field the gateway aggregates into bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    Trades,
    Midpoint,
    Bid,
    Ask,
}

impl QuoteField {
    /// Wire spelling expected by the gateway's historical-bars call.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trades => "TRADES",
            Self::Midpoint => "MIDPOINT",
            Self::Bid => "BID",
            Self::Ask => "ASK",
        }
    }
}

/// Historical-bar call parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarParams {
    /// Lookback window in the gateway's duration grammar, e.g. "30 D", "1 Y".
    pub duration: String,
    /// Bar bucket size, e.g. "5 mins", "1 day".
    pub bar_size: String,
    pub what_to_show: QuoteField,
    /// Restrict to regular trading hours.
    pub use_rth: bool,
}

impl BarParams {
    pub fn new(
        duration: impl Into<String>,
        bar_size: impl Into<String>,
        what_to_show: QuoteField,
        use_rth: bool,
    ) -> Result<Self, ValidationError> {
        let duration = duration.into();
        if duration.trim().is_empty() {
            return Err(ValidationError::EmptyDuration);
        }
        let bar_size = bar_size.into();
        if bar_size.trim().is_empty() {
            return Err(ValidationError::EmptyBarSize);
        }
        Ok(Self {
            duration,
            bar_size,
            what_to_show,
            use_rth,
        })
    }

    /// Default parameters for traded instruments: a year of daily closes.
    pub fn trades() -> Self {
        Self {
            duration: String::from("1 Y"),
            bar_size: String::from("1 day"),
            what_to_show: QuoteField::Trades,
            use_rth: true,
        }
    }

    /// Default parameters for forex pairs, which have no trade tape.
    pub fn midpoint() -> Self {
        Self {
            duration: String::from("1 Y"),
            bar_size: String::from("1 day"),
            what_to_show: QuoteField::Midpoint,
            use_rth: false,
        }
    }
}

/// Which REST collaborator serves an economic series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicEndpoint {
    Forecast { frequency: Frequency },
    InterestRate,
}

/// Closed set of instrument kinds, each carrying its call shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Equity,
    Future { exchange: String },
    Forex,
    EconomicSeries { endpoint: EconomicEndpoint },
}

impl SeriesKind {
    /// True for kinds served by the brokerage gateway session.
    pub const fn needs_gateway(&self) -> bool {
        matches!(self, Self::Equity | Self::Future { .. } | Self::Forex)
    }
}

/// One configured series: identity, kind, and bar parameters. Immutable for
/// the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSource {
    pub symbol: Symbol,
    pub kind: SeriesKind,
    pub bars: BarParams,
}

impl SeriesSource {
    pub fn equity(symbol: Symbol) -> Self {
        Self {
            symbol,
            kind: SeriesKind::Equity,
            bars: BarParams::trades(),
        }
    }

    pub fn future(symbol: Symbol, exchange: impl Into<String>) -> Self {
        Self {
            symbol,
            kind: SeriesKind::Future {
                exchange: exchange.into(),
            },
            bars: BarParams::trades(),
        }
    }

    /// A cash pair such as `EURUSD`: six letters, midpoint bars.
    pub fn forex(pair: Symbol) -> Result<Self, ValidationError> {
        let raw = pair.as_str();
        if raw.len() != 6 || !raw.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidForexPair {
                value: raw.to_owned(),
            });
        }
        Ok(Self {
            symbol: pair,
            kind: SeriesKind::Forex,
            bars: BarParams::midpoint(),
        })
    }

    pub fn forecast(id: Symbol, frequency: Frequency) -> Self {
        Self {
            symbol: id,
            kind: SeriesKind::EconomicSeries {
                endpoint: EconomicEndpoint::Forecast { frequency },
            },
            bars: BarParams::trades(),
        }
    }

    pub fn interest_rate(series: Symbol) -> Self {
        Self {
            symbol: series,
            kind: SeriesKind::EconomicSeries {
                endpoint: EconomicEndpoint::InterestRate,
            },
            bars: BarParams::trades(),
        }
    }

    pub fn with_bars(mut self, bars: BarParams) -> Self {
        self.bars = bars;
        self
    }
}

/// A [`SeriesSource`] bound to one acquisition attempt of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub source: SeriesSource,
    pub request_id: String,
}

impl FetchRequest {
    pub fn new(source: SeriesSource, request_id: impl Into<String>) -> Self {
        Self {
            source,
            request_id: request_id.into(),
        }
    }
}

/// One observation: source-local timestamp string, close, optional volume.
/// Timestamps pass through untouched; no timezone normalization happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub ts: String,
    pub close: f64,
    pub volume: Option<u64>,
}

impl DataPoint {
    pub fn new(
        ts: impl Into<String>,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        let ts = ts.into();
        if ts.trim().is_empty() {
            return Err(ValidationError::EmptyTimestamp);
        }
        if !close.is_finite() {
            return Err(ValidationError::NonFiniteClose);
        }
        Ok(Self { ts, close, volume })
    }
}

/// Outcome of one fetch request. Exactly one of these exists per request in
/// the orchestrator's result map.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Ordered observations, oldest first.
    Success(Vec<DataPoint>),
    /// The provider answered with zero rows, or the source was skipped.
    Empty,
    /// The fetch failed after `attempts` tries; `reason` is the last error.
    Failure { reason: String, attempts: u32 },
}

impl FetchResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn rows(&self) -> Option<&[DataPoint]> {
        match self {
            Self::Success(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Security type in a gateway contract description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityType {
    Stock,
    ContinuousFuture,
    Cash,
}

/// Unresolved contract description handed to the gateway's resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    pub symbol: String,
    pub security_type: SecurityType,
    pub exchange: String,
    pub currency: String,
}

impl ContractSpec {
    /// US-listed stock routed through the gateway's smart router.
    pub fn stock(symbol: &Symbol) -> Self {
        Self {
            symbol: symbol.as_str().to_owned(),
            security_type: SecurityType::Stock,
            exchange: String::from("SMART"),
            currency: String::from("USD"),
        }
    }

    /// Front-month continuous future on the named exchange.
    pub fn continuous_future(symbol: &Symbol, exchange: &str) -> Self {
        Self {
            symbol: symbol.as_str().to_owned(),
            security_type: SecurityType::ContinuousFuture,
            exchange: exchange.to_owned(),
            currency: String::from("USD"),
        }
    }

    /// Cash pair: base currency as the symbol, quote currency from the pair.
    pub fn cash_pair(pair: &Symbol) -> Self {
        let raw = pair.as_str();
        let (base, quote) = raw.split_at(3);
        Self {
            symbol: base.to_owned(),
            security_type: SecurityType::Cash,
            exchange: String::from("IDEALPRO"),
            currency: quote.to_owned(),
        }
    }
}

/// A resolved, tradeable contract returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub contract_id: i64,
    pub spec: ContractSpec,
}

/// Raw bar as returned by the gateway, before reduction to [`DataPoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalBar {
    pub ts: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forex_source_requires_six_letter_pair() {
        let pair = Symbol::parse("EURUSD").expect("valid pair");
        let source = SeriesSource::forex(pair).expect("pair should validate");
        assert_eq!(source.kind, SeriesKind::Forex);
        assert_eq!(source.bars.what_to_show, QuoteField::Midpoint);
        assert!(!source.bars.use_rth);

        let bad = Symbol::parse("EUR").expect("parses as symbol");
        let err = SeriesSource::forex(bad).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidForexPair { .. }));
    }

    #[test]
    fn cash_pair_splits_base_and_quote() {
        let pair = Symbol::parse("USDJPY").expect("valid pair");
        let spec = ContractSpec::cash_pair(&pair);
        assert_eq!(spec.symbol, "USD");
        assert_eq!(spec.currency, "JPY");
        assert_eq!(spec.security_type, SecurityType::Cash);
    }

    #[test]
    fn frequency_parses_long_and_short_names() {
        assert_eq!(
            Frequency::parse("quarterly").expect("parses"),
            Frequency::Quarterly
        );
        assert_eq!(Frequency::parse("Q").expect("parses"), Frequency::Quarterly);
        let err = Frequency::parse("fortnightly").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidFrequency { .. }));
    }

    #[test]
    fn data_point_rejects_blank_timestamp_and_nan() {
        assert!(matches!(
            DataPoint::new("  ", 1.0, None),
            Err(ValidationError::EmptyTimestamp)
        ));
        assert!(matches!(
            DataPoint::new("2026-02-20", f64::NAN, None),
            Err(ValidationError::NonFiniteClose)
        ));
    }

    #[test]
    fn bar_params_reject_empty_fields() {
        assert!(matches!(
            BarParams::new("", "1 day", QuoteField::Trades, true),
            Err(ValidationError::EmptyDuration)
        ));
        assert!(matches!(
            BarParams::new("30 D", " ", QuoteField::Trades, true),
            Err(ValidationError::EmptyBarSize)
        ));
    }
}
