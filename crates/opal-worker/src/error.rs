//! Worker error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Worker request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Engine error {name}: {message}")]
    Engine { name: String, message: String },

    #[error("{message}")]
    Protocol { message: String },
}
