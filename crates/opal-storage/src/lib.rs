//! OPAL Storage Layer
//!
//! Thread-safe access to the embedded SQLite engine.
//! Schema is owned by the caller; this crate opens handles and runs statements.

mod database;
mod error;

pub use database::{engine_version, Database, ExecOutcome};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
