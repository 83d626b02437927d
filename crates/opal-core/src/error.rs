//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] opal_storage::StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] opal_worker::WorkerError),

    #[error("Table creation error: {0}")]
    Tables(String),

    #[error("Unexpected worker response: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// Implement std::io::Error conversion for fs operations
impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
