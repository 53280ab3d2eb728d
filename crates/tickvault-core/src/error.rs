use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation and contract errors exposed by `tickvault-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid frequency '{value}', expected one of d, w, m, q, a")]
    InvalidFrequency { value: String },
    #[error("forex pair must be six ASCII letters (e.g. EURUSD): '{value}'")]
    InvalidForexPair { value: String },

    #[error("bar duration cannot be empty")]
    EmptyDuration,
    #[error("bar size cannot be empty")]
    EmptyBarSize,

    #[error("data point timestamp cannot be empty")]
    EmptyTimestamp,
    #[error("data point close must be finite")]
    NonFiniteClose,
}

/// Failure category for an external call, carried by [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Timeout,
    UpstreamStatus,
    Protocol,
    Auth,
    MissingCredential,
    NotConnected,
    Internal,
}

/// Structured error produced by gateway and REST calls.
///
/// Classification drives the retry loop: transport faults, timeouts, and
/// non-success upstream statuses are retryable; malformed requests, auth
/// failures, and missing credentials abort immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    /// Classify a non-success HTTP status. Auth statuses and malformed
    /// requests are terminal; everything else is worth another attempt.
    pub fn upstream_status(status: u16) -> Self {
        match status {
            401 | 403 => Self {
                kind: FetchErrorKind::Auth,
                message: format!("upstream rejected credentials (status {status})"),
                retryable: false,
            },
            400 | 404 | 422 => Self {
                kind: FetchErrorKind::Protocol,
                message: format!("upstream rejected request (status {status})"),
                retryable: false,
            },
            other => Self {
                kind: FetchErrorKind::UpstreamStatus,
                message: format!("upstream returned status {other}"),
                retryable: true,
            },
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Protocol,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Auth,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::MissingCredential,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_connected() -> Self {
        Self {
            kind: FetchErrorKind::NotConnected,
            message: String::from("gateway session is not connected"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Transport => "fetch.transport",
            FetchErrorKind::Timeout => "fetch.timeout",
            FetchErrorKind::UpstreamStatus => "fetch.upstream_status",
            FetchErrorKind::Protocol => "fetch.protocol",
            FetchErrorKind::Auth => "fetch.auth",
            FetchErrorKind::MissingCredential => "fetch.missing_credential",
            FetchErrorKind::NotConnected => "fetch.not_connected",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Terminal gateway connection failure. The retry budget is spent and the
/// run must halt with a nonzero status.
#[derive(Debug, Clone, Error)]
#[error("gateway connection failed after {attempts} attempt(s): {last}")]
pub struct ConnectError {
    pub attempts: u32,
    pub last: FetchError,
}

/// Run-level failures surfaced by the pipeline. Per-source fetch and persist
/// failures never reach this type; they are folded into the run report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Store(#[from] tickvault_warehouse::StoreError),
}
