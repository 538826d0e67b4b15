//! Execution of host executables (editor, audio player, text-to-speech).
//!
//! Arguments are passed as argv, never through a shell, so user-supplied
//! text such as a spoken message cannot break out of its argument.

use async_trait::async_trait;
use std::borrow::Cow;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use hostbridge_common::{BridgeError, BridgeResult};

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Location of `program` on PATH, if any.
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Run to completion. Non-zero exit is an error.
    async fn run(&self, program: &str, args: &[String]) -> BridgeResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn run(&self, program: &str, args: &[String]) -> BridgeResult<()> {
        debug!("Running: {}", render_command_line(program, args));

        let output = TokioCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => BridgeError::CommandUnavailable {
                    role: "Host",
                    command: program.to_string(),
                },
                _ => BridgeError::Io(err),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BridgeError::CommandFailed {
                command: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Shell-quoted rendering, for logs only.
pub fn render_command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|part| shell_escape::escape(Cow::Borrowed(part)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
