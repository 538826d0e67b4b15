//! Report whether the host daemon is up and which services it offers.

use anyhow::{bail, Context, Result};
use bridged_client::{HostBridge, Service};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge-check", version, about = "Check the host bridge")]
struct Cli {
    /// Also send a test sound and message through every enabled service
    #[arg(long)]
    exercise: bool,

    /// Bridge directory (or HOSTBRIDGE_DIR)
    #[arg(long)]
    bridge_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let bridge = HostBridge::resolve(cli.bridge_dir).context("failed to open bridge directory")?;

    println!("Bridge directory: {}", bridge.layout().root().display());
    let running = bridge.is_host_daemon_running();
    println!("Host daemon: {}", if running { "running" } else { "not running" });

    let config = bridge
        .services_status()
        .context("failed to read services configuration")?;
    for service in Service::ALL {
        match config.settings(service) {
            Some(settings) => println!(
                "  {:<7} {:<8} timeout {}ms  {}",
                service,
                if settings.enabled { "enabled" } else { "disabled" },
                settings.timeout_ms,
                settings.description
            ),
            None => println!("  {:<7} not configured", service),
        }
    }

    if !running {
        bail!("host daemon is not running");
    }

    if cli.exercise {
        let mut failures = 0;
        if config.is_enabled(Service::Audio) {
            let ok = bridge.audio_play("Glass", 1.0).await;
            println!("audio/play: {}", if ok { "ok" } else { "failed" });
            failures += usize::from(!ok);
        }
        if config.is_enabled(Service::Speech) {
            let ok = bridge.speech_say("Host bridge check", None, None).await;
            println!("speech/say: {}", if ok { "ok" } else { "failed" });
            failures += usize::from(!ok);
        }
        if failures > 0 {
            bail!("{} service check(s) failed", failures);
        }
    }
    Ok(())
}
