//! Play a notification sound on the host without waiting for it.

use anyhow::{bail, Context, Result};
use bridged_client::HostBridge;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge-notify", version, about = "Play a host notification sound")]
struct Cli {
    /// Sound name in the host sounds directory, or a host path
    #[arg(default_value = "Hero.aiff")]
    sound: String,

    /// Playback volume; implies --wait when not 1.0
    #[arg(long, default_value_t = 1.0)]
    volume: f64,

    /// Wait for the daemon to report the outcome
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
    let bridge = HostBridge::resolve(cli.bridge_dir).context("failed to open bridge directory")?;

    if cli.wait || (cli.volume - 1.0).abs() > f64::EPSILON {
        if !bridge.audio_play(&cli.sound, cli.volume).await {
            bail!("audio request failed");
        }
        println!("Played: {}", cli.sound);
    } else {
        bridge
            .audio_play_nowait(&cli.sound)
            .context("failed to queue audio request")?;
        println!("Sound queued: {}", cli.sound);
    }
    Ok(())
}
