//! Database acquisition manager
//!
//! Produces at most one open handle per manager, choosing between the
//! in-memory and worker-backed persistent strategies.

use async_trait::async_trait;
use tokio::sync::Mutex;

use opal_storage::Database;
use opal_worker::{persistent_filename, storage_location, RequestBody, ResponseBody, WorkerSession};

use crate::config::Config;
use crate::error::CoreError;
use crate::handle::DbHandle;
use crate::Result;

/// Creates the application schema once a handle is open.
///
/// The manager awaits completion; any result beyond success is ignored.
#[async_trait]
pub trait TableBuilder: Send + Sync {
    async fn create_tables(&self, db: &DbHandle) -> Result<()>;
}

pub struct DatabaseManager {
    config: Config,
    /// Held across a whole acquisition so concurrent callers serialize
    handle: Mutex<Option<DbHandle>>,
}

impl DatabaseManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    /// The published handle, if an acquisition has completed.
    pub async fn current(&self) -> Option<DbHandle> {
        self.handle.lock().await.clone()
    }

    /// Open a non-durable handle in the calling process.
    pub async fn open_in_memory(&self, tables: &dyn TableBuilder) -> Result<DbHandle> {
        let mut slot = self.handle.lock().await;

        if let Some(handle) = slot.as_ref() {
            tracing::info!("database already initialized");
            return Ok(handle.clone());
        }

        match self.try_open_in_memory(tables).await {
            Ok(handle) => {
                *slot = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "transient database initialization failed");
                Err(e)
            }
        }
    }

    async fn try_open_in_memory(&self, tables: &dyn TableBuilder) -> Result<DbHandle> {
        let database = Database::open_in_memory()?;
        let handle = DbHandle::direct(database);

        tables.create_tables(&handle).await?;

        tracing::info!("transient database ready");
        Ok(handle)
    }

    /// Open the persistent database hosted by the storage worker.
    pub async fn open_persistent(&self, tables: &dyn TableBuilder) -> Result<DbHandle> {
        let mut slot = self.handle.lock().await;

        if let Some(handle) = slot.as_ref() {
            tracing::info!("database already initialized");
            return Ok(handle.clone());
        }

        match self.try_open_persistent(tables).await {
            Ok(handle) => {
                *slot = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "persistent database initialization failed");
                Err(e)
            }
        }
    }

    async fn try_open_persistent(&self, tables: &dyn TableBuilder) -> Result<DbHandle> {
        std::fs::create_dir_all(&self.config.data_dir)?;

        let session =
            WorkerSession::start(self.config.data_dir.clone(), self.config.request_timeout).await?;

        let version = match session.request(RequestBody::ConfigGet).await? {
            ResponseBody::Config { version } => version,
            other => return Err(unexpected(&other)),
        };
        tracing::info!(%version, "storage engine ready");

        let filename = persistent_filename(&self.config.database_name);
        let (db, reported) = match session.request(RequestBody::Open { filename }).await? {
            ResponseBody::Opened { db, filename } => (db, filename),
            other => return Err(unexpected(&other)),
        };

        let handle = DbHandle::remote(session, db);

        if let Some(location) = storage_location(&reported) {
            tracing::info!(%location, "persistent database opened");
        }

        tables.create_tables(&handle).await?;

        Ok(handle)
    }
}

fn unexpected(body: &ResponseBody) -> CoreError {
    CoreError::UnexpectedResponse(format!("{body:?}"))
}
