//! Unified database handle

use uuid::Uuid;

use opal_storage::{Database, ExecOutcome};
use opal_worker::{ExecRequest, RequestBody, ResponseBody, WorkerSession};

use crate::error::CoreError;
use crate::Result;

/// An open database handle, usable to issue statements.
#[derive(Clone, Debug)]
pub enum DbHandle {
    /// Engine handle owned by the calling process, non-durable
    Direct(Database),
    /// Worker-hosted persistent database, reached via request/response
    Remote(RemoteHandle),
}

/// Forwards statements to a worker-hosted database.
#[derive(Clone, Debug)]
pub struct RemoteHandle {
    session: WorkerSession,
    db: Uuid,
}

impl DbHandle {
    pub(crate) fn direct(database: Database) -> Self {
        Self::Direct(database)
    }

    pub(crate) fn remote(session: WorkerSession, db: Uuid) -> Self {
        Self::Remote(RemoteHandle { session, db })
    }

    /// Execute a statement.
    ///
    /// Accepts a bare statement string or a structured [`ExecRequest`];
    /// remote handles forward the request merged with their database
    /// identifier.
    pub async fn exec(&self, request: impl Into<ExecRequest>) -> Result<ExecOutcome> {
        let request = request.into();

        match self {
            DbHandle::Direct(database) => Ok(database.exec(&request.statement)?),
            DbHandle::Remote(remote) => {
                let body = RequestBody::Exec {
                    db: remote.db,
                    request,
                };

                match remote.session.request(body).await? {
                    ResponseBody::Executed(outcome) => Ok(outcome),
                    other => Err(CoreError::UnexpectedResponse(format!("{other:?}"))),
                }
            }
        }
    }

    /// Worker-issued identifier, present for worker-backed handles.
    pub fn database_id(&self) -> Option<Uuid> {
        match self {
            DbHandle::Direct(_) => None,
            DbHandle::Remote(remote) => Some(remote.db),
        }
    }
}
