use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Malformed {table} data: {details}")]
    DataFormat { table: String, details: String },

    #[error("No FX rate to USD for {currency} in {}", .period.format("%B %Y"))]
    MissingFxRate { period: NaiveDate, currency: String },

    #[error("Not enough data: {0}")]
    InsufficientData(String),

    #[error("Date parsing error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CopilotError>;
