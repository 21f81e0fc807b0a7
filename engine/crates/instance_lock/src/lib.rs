//! PID-stamped sentinel file that keeps two client processes from driving
//! the same game slot at once.

pub mod error;

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub use error::LockError;

/// An unreadable sentinel younger than this may still be mid-write by a
/// foreign tool; older ones are abandoned.
const UNREADABLE_GRACE: Duration = Duration::from_secs(10);

/// Exclusive hold on `<identifier>.pid` for the lifetime of the process.
///
/// An empty or absent identifier produces a lock that holds nothing.
#[derive(Debug)]
pub struct InstanceLock {
    path: Option<PathBuf>,
}

impl InstanceLock {
    /// Acquire the lock for `identifier`.
    ///
    /// The sentinel is written in full under a private name and then
    /// hard-linked into place, so other acquirers never observe a partial
    /// file. A sentinel left behind by a process that is no longer running
    /// is treated as stale and replaced.
    pub fn acquire(identifier: Option<&str>) -> Result<Self, LockError> {
        let Some(identifier) = identifier.filter(|id| !id.is_empty()) else {
            return Ok(Self { path: None });
        };
        let path = PathBuf::from(format!("{identifier}.pid"));
        let pid = std::process::id();
        let candidate = suffixed(&path, &format!(".{pid}.tmp"));

        let result = write_candidate(&candidate, pid)
            .map_err(|source| LockError::Io {
                path: candidate.clone(),
                source,
            })
            .and_then(|()| publish(&path, &candidate));
        if let Err(e) = remove_sentinel(&candidate) {
            tracing::warn!("Failed to remove lock candidate: {}", e);
        }
        result?;

        tracing::info!(path = %path.display(), pid, "Instance lock acquired");
        Ok(Self { path: Some(path) })
    }

    /// Delete the sentinel. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), LockError> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };

        if let Sentinel::Owner(pid) = inspect(&path)? {
            if pid != std::process::id() {
                tracing::warn!(path = %path.display(), owner = pid, "Instance lock taken over by another process, leaving it");
                return Ok(());
            }
        }
        remove_sentinel(&path)?;
        tracing::info!(path = %path.display(), "Instance lock released");
        Ok(())
    }

    pub fn is_held(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!("Failed to release instance lock on drop: {}", e);
        }
    }
}

/// What an existing sentinel says about its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sentinel {
    Missing,
    Owner(u32),
    Unreadable { age: Duration },
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn write_candidate(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{pid}")?;
    file.sync_all()
}

/// Link the complete candidate to `path`. The link fails if `path` exists,
/// which makes publishing a single atomic step.
fn publish(path: &Path, candidate: &Path) -> Result<(), LockError> {
    // Each stale sentinel cleared may be replaced by a racing acquirer.
    for _ in 0..3 {
        match std::fs::hard_link(candidate, path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        match inspect(path)? {
            Sentinel::Missing => {}
            Sentinel::Owner(pid) if process_alive(pid) => {
                return Err(LockError::AlreadyHeld {
                    path: path.to_path_buf(),
                    pid,
                });
            }
            Sentinel::Unreadable { age } if age < UNREADABLE_GRACE => {
                return Err(LockError::Busy {
                    path: path.to_path_buf(),
                });
            }
            stale => {
                tracing::warn!(path = %path.display(), owner = ?stale, "Removing stale instance lock");
                retire_stale(path)?;
            }
        }
    }

    match inspect(path)? {
        Sentinel::Owner(pid) => Err(LockError::AlreadyHeld {
            path: path.to_path_buf(),
            pid,
        }),
        _ => Err(LockError::Busy {
            path: path.to_path_buf(),
        }),
    }
}

/// Move a stale sentinel aside under a private name and delete it. If the
/// file moved turns out to belong to a live process (another acquirer
/// replaced the stale file first), it is linked back into place.
fn retire_stale(path: &Path) -> Result<(), LockError> {
    let aside = suffixed(path, &format!(".{}.stale", std::process::id()));
    match std::fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    if let Sentinel::Owner(pid) = inspect(&aside)? {
        if process_alive(pid) {
            tracing::debug!(path = %path.display(), owner = pid, "Restoring live instance lock moved aside");
            match std::fs::hard_link(&aside, path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => {
                    remove_sentinel(&aside)?;
                    return Err(LockError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }
    remove_sentinel(&aside)
}

fn inspect(path: &Path) -> Result<Sentinel, LockError> {
    let io_error = |source| LockError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Sentinel::Missing),
        Err(source) => return Err(io_error(source)),
    };
    if let Some(pid) = String::from_utf8_lossy(&bytes)
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0)
    {
        return Ok(Sentinel::Owner(pid));
    }

    let modified = match std::fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Sentinel::Missing),
        Err(_) => SystemTime::now(),
    };
    Ok(Sentinel::Unreadable {
        age: modified.elapsed().unwrap_or(Duration::ZERO),
    })
}

fn remove_sentinel(path: &Path) -> Result<(), LockError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
