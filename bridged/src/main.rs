//! Host-Bridge Daemon
//!
//! Runs on the host and answers requests that containerized agents drop into
//! the shared bridge directory: open a path in the editor, play a sound,
//! speak a message. Requests and responses are newline-delimited JSON files;
//! the daemon polls them on a fixed cadence.

mod dispatcher;
mod handlers;
mod host_command;
mod lock;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use hostbridge_common::{BridgeLayout, ConfigStore, PathTranslator, POLL_INTERVAL_MS};

use dispatcher::Dispatcher;
use handlers::{HandlerOptions, HandlerRegistry};
use host_command::SystemRunner;
use lock::{DaemonLock, LockError};

const DEFAULT_SPEECH_MAX_AGE_SECS: u64 = 120;
const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "bridged", version)]
#[command(about = "Host-bridge daemon: answers editor, audio and speech requests from containers")]
struct Cli {
    /// Bridge directory shared with the container (or HOSTBRIDGE_DIR)
    #[arg(long)]
    bridge_dir: Option<PathBuf>,

    /// Host project root that /workspace/main maps to (or HOSTBRIDGE_PROJECT_ROOT)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Skip speech requests older than this many seconds (or SPEECH_MAX_AGE_SECONDS)
    #[arg(long)]
    speech_max_age: Option<u64>,

    /// Queue polling interval in milliseconds
    #[arg(long, default_value_t = POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let layout = BridgeLayout::resolve(cli.bridge_dir.clone())
        .context("failed to resolve bridge directory")?;
    layout
        .ensure_dirs()
        .with_context(|| format!("failed to create {}", layout.root().display()))?;

    logging::init(&layout.log_file(), cli.debug)?;

    // Installed before the PID file appears so an early SIGTERM is not fatal.
    let mut signals = ShutdownSignals::install().context("failed to install signal handlers")?;

    let lock = match DaemonLock::acquire(&layout.pid_file()) {
        Ok(lock) => lock,
        Err(err @ LockError::AlreadyRunning { .. }) => {
            error!("{}", err);
            return Err(err.into());
        }
        Err(err) => return Err(err).context("failed to acquire daemon lock"),
    };

    let project_root = resolve_project_root(cli.project_root.clone())?;
    let speech_max_age = Duration::from_secs(resolve_speech_max_age(cli.speech_max_age));

    let config = ConfigStore::new(&layout.config_dir())
        .load_or_create()
        .context("failed to load services configuration")?;

    let options = HandlerOptions {
        translator: PathTranslator::new(&project_root),
        speech_max_age,
    };
    let registry = HandlerRegistry::from_config(&config, &options, Arc::new(SystemRunner));
    if registry.is_empty() {
        warn!("No services enabled in {}", layout.services_file().display());
    }
    let mut dispatcher = Dispatcher::new(layout.clone(), registry);

    info!(
        "Host-Bridge daemon {} started (PID: {})",
        DAEMON_VERSION,
        std::process::id()
    );
    info!("Bridge directory: {}", layout.root().display());
    info!("PID file: {}", lock.path().display());
    info!("Project root: {}", project_root.display());
    info!(
        "Processing requests for: {}",
        dispatcher
            .services()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "Speech queue filtering: max age {}s (configurable via SPEECH_MAX_AGE_SECONDS)",
        speech_max_age.as_secs()
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting main processing loop");
    let reason = loop {
        tokio::select! {
            reason = signals.recv() => break reason,
            _ = ticker.tick() => {}
        }
        dispatcher.poll_once().await;
    };

    info!("Received {}; shutting down host-bridge daemon", reason);
    drop(lock);
    Ok(())
}

fn resolve_project_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    if let Some(root) = std::env::var_os("HOSTBRIDGE_PROJECT_ROOT").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    std::env::current_dir().context("failed to resolve current directory")
}

fn resolve_speech_max_age(explicit: Option<u64>) -> u64 {
    explicit
        .or_else(|| parse_speech_max_age(std::env::var("SPEECH_MAX_AGE_SECONDS").ok().as_deref()))
        .unwrap_or(DEFAULT_SPEECH_MAX_AGE_SECS)
}

/// Value of `SPEECH_MAX_AGE_SECONDS`; unset, blank or invalid means no override.
fn parse_speech_max_age(raw: Option<&str>) -> Option<u64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Invalid SPEECH_MAX_AGE_SECONDS value '{}': {}", trimmed, err);
            None
        }
    }
}

struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl+C"
    }
}
