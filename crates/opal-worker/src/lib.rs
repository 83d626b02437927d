//! OPAL Worker
//!
//! Persistent database connections are hosted on a dedicated thread and
//! reached exclusively through a typed request/response protocol. Every
//! round-trip is bounded by a configurable timeout.

mod error;
mod host;
mod protocol;
mod session;

pub use error::WorkerError;
pub use protocol::{
    persistent_filename, storage_location, ExecRequest, Request, RequestBody, Response,
    ResponseBody, PERSISTENT_VFS,
};
pub use session::WorkerSession;

pub type Result<T> = std::result::Result<T, WorkerError>;
