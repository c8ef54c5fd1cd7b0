use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Run metadata encode error: {0}")]
    MetaEncode(#[from] toml::ser::Error),

    #[error("Run metadata decode error: {0}")]
    MetaDecode(#[from] toml::de::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("hash sample verification failed: {bad} bad of {sampled} sampled")]
    VerificationFailed { bad: usize, sampled: usize },

    #[error("no verifiable (source, quarantine) pairs")]
    NoVerifiablePairs,

    #[error("{0}")]
    Other(String),
}
