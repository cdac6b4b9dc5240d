use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesReportError {
    #[error("Missing required columns {missing:?}; available columns: {available:?}")]
    Schema {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Input contains no data: {0}")]
    EmptyInput(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid or missing input file: {0}")]
    InvalidInputPath(String),

    #[error("Invalid keyword rule '{pattern}': {details}")]
    InvalidRule { pattern: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SalesReportError {
    pub fn schema(missing: Vec<String>, available: &[String]) -> Self {
        Self::Schema {
            missing,
            available: available.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SalesReportError>;
