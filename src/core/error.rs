//! Error types for terrain generation and streaming

use thiserror::Error;

use crate::vegetation::species::Species;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// Shared lookup data needed by a generation call is not registered.
    #[error("no template registered for species `{species}`")]
    GenerationPrecondition { species: Species },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Streaming error: {0}")]
    Streaming(String),
}

impl Error {
    /// Whether a later retry of the same generation call can succeed once
    /// the caller fixes its shared state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::GenerationPrecondition { .. } | Error::Streaming(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_message_names_species() {
        let err = Error::GenerationPrecondition { species: Species::FlowerHead };
        assert_eq!(err.to_string(), "no template registered for species `flower-head`");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error_from_serde() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_retryable());
    }
}
