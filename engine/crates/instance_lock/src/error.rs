use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{path} is held by running process {pid}")]
    AlreadyHeld { path: PathBuf, pid: u32 },

    #[error("{path} is being written by another process")]
    Busy { path: PathBuf },

    #[error("lock file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
