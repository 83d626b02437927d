//! Worker thread hosting persistent database connections

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use opal_storage::Database;

use crate::protocol::{storage_location, Request, RequestBody, Response, ResponseBody};

/// Serve requests until the request channel closes.
///
/// Readiness is signalled exactly once, before the first request is read.
pub(crate) fn run(
    root: PathBuf,
    ready: oneshot::Sender<()>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    responses: mpsc::UnboundedSender<Response>,
) {
    let mut databases: HashMap<Uuid, Database> = HashMap::new();

    if ready.send(()).is_err() {
        // Client went away before startup finished
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let body = dispatch(&root, &mut databases, request.body);
        let response = Response {
            id: request.id,
            body,
        };

        if responses.send(response).is_err() {
            break;
        }
    }

    tracing::debug!("storage worker stopped");
}

fn dispatch(
    root: &Path,
    databases: &mut HashMap<Uuid, Database>,
    body: RequestBody,
) -> ResponseBody {
    match body {
        RequestBody::ConfigGet => ResponseBody::Config {
            version: opal_storage::engine_version().to_string(),
        },
        RequestBody::Open { filename } => open_database(root, databases, filename),
        RequestBody::Exec { db, request } => match databases.get(&db) {
            Some(database) => match database.exec(&request.statement) {
                Ok(outcome) => ResponseBody::Executed(outcome),
                Err(e) => engine_failure(&e),
            },
            None => session_failure(format!("unknown database id: {db}")),
        },
        RequestBody::Close { db } => match databases.remove(&db) {
            Some(_) => {
                tracing::debug!(%db, "closed persistent database");
                ResponseBody::Closed
            }
            None => session_failure(format!("unknown database id: {db}")),
        },
    }
}

fn open_database(
    root: &Path,
    databases: &mut HashMap<Uuid, Database>,
    filename: String,
) -> ResponseBody {
    let location = match storage_location(&filename) {
        Some(location) => location,
        None => return session_failure(format!("malformed storage path: {filename}")),
    };

    match Database::open(root.join(location)) {
        Ok(database) => {
            let db = Uuid::new_v4();
            databases.insert(db, database);

            tracing::debug!(%db, %location, "opened persistent database");
            ResponseBody::Opened { db, filename }
        }
        Err(e) => engine_failure(&e),
    }
}

fn engine_failure(error: &opal_storage::StorageError) -> ResponseBody {
    ResponseBody::Failure(json!({
        "name": "StorageError",
        "message": error.to_string(),
    }))
}

fn session_failure(message: String) -> ResponseBody {
    ResponseBody::Failure(json!({ "result": { "message": message } }))
}
