use thiserror::Error;

use tickvault_core::PipelineError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            // The one fatal acquisition failure: gateway budget exhausted.
            Self::Pipeline(PipelineError::Connect(_)) => 1,
            Self::Config(_) => 2,
            Self::Pipeline(PipelineError::Store(_)) => 4,
            Self::Serialization(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickvault_core::{ConnectError, FetchError};

    #[test]
    fn connect_exhaustion_maps_to_exit_one() {
        let error = CliError::Pipeline(PipelineError::Connect(ConnectError {
            attempts: 5,
            last: FetchError::transport("refused"),
        }));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn config_errors_map_to_exit_two() {
        let error = CliError::Config(String::from("bad port"));
        assert_eq!(error.exit_code(), 2);
    }
}
