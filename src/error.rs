//! Error types for the AutoZap console

use thiserror::Error;

/// Result type alias for AutoZap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the AutoZap console
///
/// None of these reach the simulated customer. Reply generation folds them into
/// canned text; everything else surfaces to the operator through the binary.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generative-text provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// State persistence error
    #[error("storage error: {0}")]
    Storage(String),

    /// Shell command could not be parsed
    #[error("invalid command: {0}")]
    Command(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
