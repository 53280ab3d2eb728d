//! Canonical domain types for acquisition runs.

mod models;
mod symbol;

pub use models::{
    BarParams, Contract, ContractSpec, DataPoint, EconomicEndpoint, FetchRequest, FetchResult,
    Frequency, HistoricalBar, QuoteField, SecurityType, SeriesKind, SeriesSource,
};
pub use symbol::Symbol;
