//! Client half of the storage worker

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::error::WorkerError;
use crate::host;
use crate::protocol::{decode_failure, Request, RequestBody, Response, ResponseBody};
use crate::Result;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<ResponseBody>>>>;

/// Handle to a running storage worker.
///
/// Requests carry correlation ids; a background task routes responses back
/// to the registered waiter. Every round-trip, including the initial
/// readiness wait, is bounded by the session's request timeout.
#[derive(Debug)]
pub struct WorkerSession {
    requests: mpsc::UnboundedSender<Request>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
    request_timeout: Duration,
}

impl WorkerSession {
    /// Spawn the worker thread rooted at `root` and wait for readiness.
    pub async fn start(root: PathBuf, request_timeout: Duration) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("opal-worker".to_string())
            .spawn(move || host::run(root, ready_tx, request_rx, response_tx))?;

        let session = Self::connect(request_tx, response_rx, request_timeout);
        session.await_ready(ready_rx).await?;

        tracing::debug!("storage worker ready");
        Ok(session)
    }

    /// Wire a session over existing channels and start the response router.
    fn connect(
        requests: mpsc::UnboundedSender<Request>,
        responses: mpsc::UnboundedReceiver<Response>,
        request_timeout: Duration,
    ) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(route_responses(Arc::clone(&pending), responses));

        Self {
            requests,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            request_timeout,
        }
    }

    async fn await_ready(&self, ready: oneshot::Receiver<()>) -> Result<()> {
        timeout(self.request_timeout, ready)
            .await
            .map_err(|_| WorkerError::Timeout(self.request_timeout))?
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, body: RequestBody) -> Result<ResponseBody> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (response_tx, response_rx) = oneshot::channel();
        self.pending.lock().insert(id, response_tx);

        if self.requests.send(Request { id, body }).is_err() {
            self.pending.lock().remove(&id);
            return Err(WorkerError::ChannelClosed);
        }

        let body = match timeout(self.request_timeout, response_rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => return Err(WorkerError::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                return Err(WorkerError::Timeout(self.request_timeout));
            }
        };

        match body {
            ResponseBody::Failure(payload) => Err(decode_failure(payload)),
            body => Ok(body),
        }
    }
}

impl Clone for WorkerSession {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            pending: Arc::clone(&self.pending),
            next_id: Arc::clone(&self.next_id),
            request_timeout: self.request_timeout,
        }
    }
}

/// Route responses from the worker to their registered waiters.
async fn route_responses(pending: PendingMap, mut responses: mpsc::UnboundedReceiver<Response>) {
    while let Some(response) = responses.recv().await {
        match pending.lock().remove(&response.id) {
            Some(waiter) => {
                if waiter.send(response.body).is_err() {
                    tracing::warn!(id = response.id, "response waiter dropped");
                }
            }
            None => tracing::warn!(id = response.id, "response for unknown request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::persistent_filename;
    use uuid::Uuid;

    fn test_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("opal-worker-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let session = WorkerSession::start(test_root(), Duration::from_secs(5))
            .await
            .unwrap();

        let version = match session.request(RequestBody::ConfigGet).await.unwrap() {
            ResponseBody::Config { version } => version,
            other => panic!("unexpected response: {other:?}"),
        };
        assert!(!version.is_empty());

        let db = match session
            .request(RequestBody::Open {
                filename: persistent_filename("round-trip.db"),
            })
            .await
            .unwrap()
        {
            ResponseBody::Opened { db, .. } => db,
            other => panic!("unexpected response: {other:?}"),
        };

        session
            .request(RequestBody::Exec {
                db,
                request: "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)".into(),
            })
            .await
            .unwrap();

        let outcome = match session
            .request(RequestBody::Exec {
                db,
                request: "INSERT INTO notes (body) VALUES ('hello')".into(),
            })
            .await
            .unwrap()
        {
            ResponseBody::Executed(outcome) => outcome,
            other => panic!("unexpected response: {other:?}"),
        };
        assert_eq!(outcome.changes, 1);

        let outcome = match session
            .request(RequestBody::Exec {
                db,
                request: "SELECT * FROM notes".into(),
            })
            .await
            .unwrap()
        {
            ResponseBody::Executed(outcome) => outcome,
            other => panic!("unexpected response: {other:?}"),
        };
        assert_eq!(outcome.rows, 1);

        let closed = session.request(RequestBody::Close { db }).await.unwrap();
        assert!(matches!(closed, ResponseBody::Closed));
    }

    #[tokio::test]
    async fn test_exec_on_unknown_database_is_protocol_error() {
        let session = WorkerSession::start(test_root(), Duration::from_secs(5))
            .await
            .unwrap();

        let error = session
            .request(RequestBody::Exec {
                db: Uuid::new_v4(),
                request: "SELECT 1".into(),
            })
            .await
            .unwrap_err();

        match error {
            WorkerError::Protocol { message } => {
                assert!(message.contains("unknown database id"));
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_engine_error_carries_name_and_message() {
        let session = WorkerSession::start(test_root(), Duration::from_secs(5))
            .await
            .unwrap();

        let db = match session
            .request(RequestBody::Open {
                filename: persistent_filename("engine-error.db"),
            })
            .await
            .unwrap()
        {
            ResponseBody::Opened { db, .. } => db,
            other => panic!("unexpected response: {other:?}"),
        };

        let error = session
            .request(RequestBody::Exec {
                db,
                request: "NOT A STATEMENT".into(),
            })
            .await
            .unwrap_err();

        match error {
            WorkerError::Engine { name, message } => {
                assert_eq!(name, "StorageError");
                assert!(!message.is_empty());
            }
            other => panic!("expected engine error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stalled_readiness_times_out() {
        let (_ready_tx, ready_rx) = oneshot::channel::<()>();
        let (request_tx, _request_rx) = mpsc::unbounded_channel();
        let (_response_tx, response_rx) = mpsc::unbounded_channel();

        let session = WorkerSession::connect(request_tx, response_rx, Duration::from_millis(50));
        let error = session.await_ready(ready_rx).await.unwrap_err();

        assert!(matches!(error, WorkerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let (request_tx, _request_rx) = mpsc::unbounded_channel();
        let (_response_tx, response_rx) = mpsc::unbounded_channel();

        let session = WorkerSession::connect(request_tx, response_rx, Duration::from_millis(50));
        let error = session.request(RequestBody::ConfigGet).await.unwrap_err();

        assert!(matches!(error, WorkerError::Timeout(_)));
        assert!(session.pending.lock().is_empty());
    }
}
