//! Error types for the SOROverse agents

use thiserror::Error;

/// Result type alias for core operations
pub type SoroResult<T> = Result<T, SoroError>;

/// Errors that can occur inside an agent.
///
/// Only `Config`, `MissingEnv` and `Knowledge` are fatal (raised at startup). Everything else
/// is caught at the call site and turned into a degraded outcome or a failed relay.
#[derive(Error, Debug)]
pub enum SoroError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for SoroError {
    fn from(err: config::ConfigError) -> Self {
        SoroError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SoroError {
    fn from(err: toml::de::Error) -> Self {
        SoroError::Knowledge(err.to_string())
    }
}

impl From<sled::Error> for SoroError {
    fn from(err: sled::Error) -> Self {
        SoroError::Ledger(err.to_string())
    }
}

impl From<regex::Error> for SoroError {
    fn from(err: regex::Error) -> Self {
        SoroError::Knowledge(err.to_string())
    }
}

impl SoroError {
    /// True for errors that must abort process startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SoroError::Config(_) | SoroError::MissingEnv(_) | SoroError::Knowledge(_)
        )
    }
}
