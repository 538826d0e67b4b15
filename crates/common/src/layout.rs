//! On-disk layout of a bridge directory.
//!
//! ```text
//! <root>/requests/<service>.queue
//! <root>/responses/<service>.response
//! <root>/config/services.json
//! <root>/config/daemon.pid
//! <root>/logs/bridge.log
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::protocol::Service;
use crate::BRIDGE_DIR_ENV;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeLayout {
    root: PathBuf,
}

impl BridgeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit path, then `HOSTBRIDGE_DIR`, then `<cwd>/runtime/host-bridge`.
    pub fn resolve(explicit: Option<PathBuf>) -> io::Result<Self> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Some(root) = std::env::var_os(BRIDGE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        Ok(Self::new(
            std::env::current_dir()?.join("runtime").join("host-bridge"),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.root.join("requests")
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.root.join("responses")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn queue_file(&self, service: Service) -> PathBuf {
        self.requests_dir().join(format!("{service}.queue"))
    }

    pub fn response_file(&self, service: Service) -> PathBuf {
        self.responses_dir().join(format!("{service}.response"))
    }

    pub fn services_file(&self) -> PathBuf {
        self.config_dir().join("services.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.config_dir().join("daemon.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("bridge.log")
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            self.requests_dir(),
            self.responses_dir(),
            self.config_dir(),
            self.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
