use thiserror::Error;

/// Failures raised below the data access boundary.
///
/// None of these ever escapes to the top level: reads turn them into an empty
/// table plus a message, writes into a failed [`WriteOutcome`](super::data_access::WriteOutcome).
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No database connection for '{target}': {reason}")]
    ConnectionUnavailable { target: String, reason: String },
    #[error("Read error: {0}")]
    ReadFailure(String),
    #[error("Write error: {0}")]
    WriteFailure(String),
    #[error("Table not found or has no columns: {0}")]
    SchemaNotFound(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl DataError {
    pub fn connection(target: &str, reason: impl Into<String>) -> Self {
        DataError::ConnectionUnavailable {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
