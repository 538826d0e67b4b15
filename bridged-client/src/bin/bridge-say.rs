//! Speak a message on the host.
//!
//! Queues the message and returns immediately, or with `--wait` blocks until
//! the daemon reports the outcome.

use anyhow::{bail, Context, Result};
use bridged_client::HostBridge;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge-say", version, about = "Speak a message through the host bridge")]
struct Cli {
    /// Message to speak
    #[arg(required = true)]
    message: Vec<String>,

    /// Voice name (host default when omitted)
    #[arg(long)]
    voice: Option<String>,

    /// Words per minute
    #[arg(long)]
    rate: Option<u32>,

    /// Wait for the daemon to finish speaking
    #[arg(long)]
    wait: bool,

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
    let message = cli.message.join(" ");
    let bridge = HostBridge::resolve(cli.bridge_dir).context("failed to open bridge directory")?;

    if cli.wait || cli.voice.is_some() || cli.rate.is_some() {
        if !bridge.speech_say(&message, cli.voice.as_deref(), cli.rate).await {
            bail!("speech request failed");
        }
        println!("Spoke: {}", message);
    } else {
        let id = bridge
            .speech_say_nowait(&message)
            .context("failed to queue speech request")?;
        println!("Speech queued ({}): {}", id, message);
    }
    Ok(())
}
