//! Newline-delimited JSON files shared between container and host.
//!
//! No locking: both sides append with `O_APPEND` and readers tolerate
//! partially written trailing lines.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Serialize `value` as a single line and append it to `path`.
pub fn append_json_line<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let line = serde_json::to_string(value)? + "\n";
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()
}

/// Non-blank lines of `path`. A missing file reads as empty.
///
/// Lines that are not valid UTF-8 are logged and left out; they never make
/// the whole file unreadable.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    Ok(content
        .split(|byte| *byte == b'\n')
        .filter_map(|raw| match std::str::from_utf8(raw) {
            Ok(line) => Some(line.trim()),
            Err(err) => {
                warn!("Skipping non-UTF-8 line in {}: {}", path.display(), err);
                None
            }
        })
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

pub fn truncate(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map(drop)
}

/// Read every line and then empty the file.
///
/// Not atomic: a line appended between the read and the truncation is lost.
pub fn drain(path: &Path) -> io::Result<Vec<String>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => return Ok(Vec::new()),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    }
    let lines = read_lines(path)?;
    truncate(path)?;
    Ok(lines)
}
