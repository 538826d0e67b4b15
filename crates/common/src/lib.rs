// # -----------------------------
// # crates/common/src/lib.rs
// # -----------------------------
//! Shared building blocks for the host bridge.
//!
//! The container-side client and the host daemon never talk to each other
//! directly: they exchange newline-delimited JSON through a directory both
//! sides mount. This crate owns everything both ends must agree on: the
//! message shapes, the on-disk layout, the service configuration and the
//! container-to-host path rewriting.

pub mod config;
pub mod error;
pub mod fs;
pub mod layout;
pub mod path_translator;
pub mod protocol;

pub use config::{
    AudioConfig, ConfigStore, EditorConfig, ServiceSettings, ServicesConfig, SpeechConfig,
};
pub use error::{BridgeError, BridgeResult};
pub use layout::BridgeLayout;
pub use path_translator::PathTranslator;
pub use protocol::{BridgeRequest, BridgeResponse, Priority, ResponseStatus, Service};

/// Default client-side and daemon-side polling cadence.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Environment variable overriding the bridge root directory.
pub const BRIDGE_DIR_ENV: &str = "HOSTBRIDGE_DIR";
