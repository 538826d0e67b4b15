//! Single-instance guard for the daemon.
//!
//! The PID file doubles as the lock file: the daemon holds an exclusive
//! advisory lock on it for its whole lifetime. A second daemon fails to take
//! the lock instead of probing the recorded PID, so there is no window
//! between "is it alive?" and "write my PID".

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Daemon already running (PID: {})", .pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into()))]
    AlreadyRunning { pid: Option<u32> },
    #[error("failed to lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held for the daemon's lifetime. Dropping it removes the PID file.
#[derive(Debug)]
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let io_err = |source: io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        loop {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(io_err)?;

            if let Err(err) = file.try_lock_exclusive() {
                if is_contended(&err) {
                    let pid = read_pid(&mut file);
                    return Err(LockError::AlreadyRunning { pid });
                }
                return Err(io_err(err));
            }

            // The previous holder may have unlinked the file between our open
            // and our lock; a lock on an orphaned inode guards nothing.
            if !still_linked(&file, path).map_err(io_err)? {
                debug!("PID file {} was replaced while locking; retrying", path.display());
                continue;
            }

            if let Some(stale) = read_pid(&mut file) {
                info!("Removing stale PID file (PID: {})", stale);
            }

            file.set_len(0).map_err(io_err)?;
            file.seek(SeekFrom::Start(0)).map_err(io_err)?;
            write!(file, "{}", std::process::id()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
            debug!("Acquired daemon lock at {}", path.display());

            return Ok(Self {
                file,
                path: path.to_path_buf(),
            });
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Whether `path` still names the inode behind `file`.
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut raw).ok()?;
    raw.trim().parse().ok()
}
