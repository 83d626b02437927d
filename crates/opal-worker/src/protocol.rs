//! Request/response protocol between clients and the storage worker

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use opal_storage::ExecOutcome;

use crate::error::WorkerError;

/// Backend token carried in persistent storage URIs.
pub const PERSISTENT_VFS: &str = "persistent";

/// Build the URI naming a persistent database.
pub fn persistent_filename(name: &str) -> String {
    format!("file:{name}?vfs={PERSISTENT_VFS}")
}

/// Recover the on-disk name from a storage URI.
///
/// `file:mydb.sqlite3?vfs=opfs` yields `mydb.sqlite3`. Returns `None` when
/// the input does not follow the `file:<name>?vfs=<backend>` convention.
pub fn storage_location(filename: &str) -> Option<&str> {
    let rest = filename.strip_prefix("file:")?;
    let (name, _backend) = rest.split_once("?vfs=")?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// A statement execution request.
///
/// Bare statement strings normalize into the structured form via `From`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub statement: String,
}

impl From<&str> for ExecRequest {
    fn from(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
        }
    }
}

impl From<String> for ExecRequest {
    fn from(statement: String) -> Self {
        Self { statement }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub body: RequestBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum RequestBody {
    ConfigGet,
    Open { filename: String },
    Exec { db: Uuid, request: ExecRequest },
    Close { db: Uuid },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub body: ResponseBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ResponseBody {
    Config { version: String },
    Opened { db: Uuid, filename: String },
    Executed(ExecOutcome),
    Closed,
    Failure(Value),
}

/// Decode a failure payload into a tagged error.
///
/// Engine errors arrive as `{ name, message }`; session-level faults arrive
/// wrapped in a `{ result: { message } }` envelope. Anything else degrades
/// to a protocol error carrying the raw payload text.
pub fn decode_failure(payload: Value) -> WorkerError {
    #[derive(Deserialize)]
    struct Standard {
        name: String,
        message: String,
    }

    #[derive(Deserialize)]
    struct Nested {
        message: String,
    }

    #[derive(Deserialize)]
    struct Envelope {
        result: Nested,
    }

    if let Ok(standard) = serde_json::from_value::<Standard>(payload.clone()) {
        return WorkerError::Engine {
            name: standard.name,
            message: standard.message,
        };
    }

    if let Ok(envelope) = serde_json::from_value::<Envelope>(payload.clone()) {
        return WorkerError::Protocol {
            message: envelope.result.message,
        };
    }

    WorkerError::Protocol {
        message: payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_location() {
        assert_eq!(
            storage_location("file:mydb.sqlite3?vfs=opfs"),
            Some("mydb.sqlite3")
        );
        assert_eq!(
            storage_location(&persistent_filename("opal.db")),
            Some("opal.db")
        );
        assert_eq!(storage_location("mydb.sqlite3"), None);
        assert_eq!(storage_location("file:mydb.sqlite3"), None);
        assert_eq!(storage_location("file:?vfs=opfs"), None);
    }

    #[test]
    fn test_exec_request_normalization() {
        let from_str = ExecRequest::from("SELECT 1");
        let structured = ExecRequest {
            statement: "SELECT 1".to_string(),
        };
        assert_eq!(from_str, structured);
    }

    #[test]
    fn test_decode_standard_failure() {
        let payload = json!({ "name": "StorageError", "message": "disk full" });
        match decode_failure(payload) {
            WorkerError::Engine { name, message } => {
                assert_eq!(name, "StorageError");
                assert_eq!(message, "disk full");
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_enveloped_failure() {
        let payload = json!({ "result": { "message": "boom" } });
        match decode_failure(payload) {
            WorkerError::Protocol { message } => assert_eq!(message, "boom"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unrecognized_failure() {
        let payload = json!(["not", "a", "failure"]);
        match decode_failure(payload) {
            WorkerError::Protocol { message } => assert!(message.contains("not")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
