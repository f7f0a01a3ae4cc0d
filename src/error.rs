use thiserror::Error;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Input could not be decoded with any candidate encoding (tried: {})", tried.join(", "))]
    Encoding { tried: Vec<String> },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Entity key field list is empty")]
    EmptyGroupKey,

    #[error("Duplicate column in header: {0}")]
    DuplicateColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DedupError>;
