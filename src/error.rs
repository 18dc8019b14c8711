use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingSummaryError {
    #[error("Data unavailable from {source_name}: {details}")]
    DataUnavailable { source_name: String, details: String },

    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid record at row {line}: {details}")]
    InvalidRecord { line: usize, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Export error: {0}")]
    ExportError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BillingSummaryError {
    pub fn data_unavailable(source_name: impl Into<String>, details: impl ToString) -> Self {
        Self::DataUnavailable {
            source_name: source_name.into(),
            details: details.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingSummaryError>;
