use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Parse error on row {row}: {details}")]
    Parse { row: usize, details: String },

    #[error("Missing required column '{0}' in tabular input")]
    MissingColumn(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid metric request: {0}")]
    InvalidRequest(String),

    #[error("Unknown company id: {0}")]
    UnknownCompany(u32),

    #[error("Company already registered: {0}")]
    DuplicateCompany(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
