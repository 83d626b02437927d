//! OPAL Core
//!
//! Coordination layer: configuration, the unified database handle, and the
//! acquisition manager that produces it.

mod config;
mod error;
mod handle;
mod manager;

pub use config::Config;
pub use error::CoreError;
pub use handle::{DbHandle, RemoteHandle};
pub use manager::{DatabaseManager, TableBuilder};

// Re-export storage and worker surfaces
pub use opal_storage::{engine_version, Database, ExecOutcome, StorageError};
pub use opal_worker::{ExecRequest, WorkerError, WorkerSession};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
