//! Error types for bankrecon

use thiserror::Error;

/// Result type alias using the bankrecon common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared parsing, configuration and workbook layers
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Invalid date {value:?} for format {format:?}")]
    InvalidDate {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),
}
