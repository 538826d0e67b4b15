//! Error taxonomy for the host bridge.
//!
//! Handler-side variants never escape the daemon: they are rendered into an
//! `error` response. Configuration variants surface to the client caller
//! before any request is written.

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::Service;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Service missing from `services.json` or flagged `enabled: false`.
    #[error("Service '{0}' is not enabled")]
    ServiceDisabled(Service),

    /// The client found no `services.json` to read.
    #[error("Services configuration not found at {}. Is the host daemon running?", .0.display())]
    ConfigMissing(PathBuf),

    /// A translated editor path is absent on the host.
    #[error("Path does not exist: {}", .0.display())]
    PathMissing(PathBuf),

    /// A sound file does not exist on the host.
    #[error("{what} not found: {}", .path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// Host executable cannot be resolved on PATH.
    #[error("{role} command '{command}' not found on PATH")]
    CommandUnavailable { role: &'static str, command: String },

    /// Host executable ran but reported failure.
    #[error("'{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Missing required payload field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown {service} action: {action}")]
    UnknownAction { service: Service, action: String },

    /// A queue or response line that is not a valid message.
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
