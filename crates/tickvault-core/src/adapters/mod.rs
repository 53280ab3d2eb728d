//! REST collaborators for economic series.

mod forecast;
mod rates;

pub use forecast::ForecastAdapter;
pub use rates::InterestRateAdapter;

/// Default base URL for the economic forecast service.
pub const DEFAULT_FORECAST_URL: &str = "https://api.tradingeconomics.com/forecast/indicator";

/// Default base URL for the interest rate observations service.
pub const DEFAULT_RATES_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
