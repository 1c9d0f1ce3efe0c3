//! Error types
//!
//! One enum per component. Per-device failures (`ScanError::Device`,
//! `ProbeError`) are absorbed by the scanner; everything else is fatal to the
//! program once it reaches `main`.

use std::io;
use std::path::PathBuf;

/// Failures of the fork/exec/wait primitive
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("can't create process: {0}")]
    Spawn(#[source] io::Error),

    #[error("can't execute program: {0}")]
    Exec(#[source] io::Error),

    #[error("can't wait for child process: {0}")]
    Wait(#[source] io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Device scan errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("can't initiate device scan: {0}")]
    EnumeratorStart(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("can't allocate boot catalog")]
    Allocation,
}

impl ScanError {
    /// Whether the error must abort the whole scan
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScanError::Device(_))
    }
}

/// Boot information probe errors
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("no kernel found under {0:?}")]
    NotFound(PathBuf),

    #[error("can't load icon {0:?}: {1}")]
    Icon(PathBuf, String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Kernel launch errors. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("can't mount boot device {device}: {source}")]
    Mount {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("kexec can't load kernel: {0}")]
    Load(String),

    #[error("kexec can't execute kernel: {0}")]
    Exec(#[source] ProcessError),
}

/// Event loop errors
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("rescan failed: {0}")]
    Rescan(#[source] ScanError),

    #[error("event loop aborted")]
    Aborted,
}

/// Init supervisor errors
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("can't mount procfs: {0}")]
    ProcMount(#[source] io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}
