use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type HalResult<T> = Result<T, HalError>;
pub type LoopResult<T> = Result<T, LoopError>;

/// Errors reported by a HAL backend. Every variant maps onto a kernel errno.
#[derive(Error, Debug)]
pub enum HalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("nix errno: {0}")]
    Nix(#[from] Errno),
}

impl HalError {
    /// The kernel error code behind this failure (`EIO` when the source carried none).
    pub fn errno(&self) -> Errno {
        match self {
            HalError::Nix(errno) => *errno,
            HalError::Io(err) => err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("cannot open backing file {}: {source}", path.display())]
    BackingFile {
        path: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("no free loop device after {scanned} candidate(s)")]
    NoFreeDevice {
        scanned: u32,
        last: Option<Errno>,
    },

    #[error("{} is not a loop block device", device.display())]
    NotLoopDevice { device: PathBuf },

    #[error("cannot open {}: {source}", device.display())]
    OpenDevice {
        device: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("cannot query status of {}: {source}", device.display())]
    Status {
        device: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("cannot bind {}: {source}", device.display())]
    Bind {
        device: PathBuf,
        #[source]
        source: HalError,
    },

    #[error("{} is bound to a different file or offset", device.display())]
    DeviceInUse { device: PathBuf },

    #[error("cannot release {}: {source}", device.display())]
    Release {
        device: PathBuf,
        #[source]
        source: HalError,
    },
}

impl LoopError {
    /// Numeric code for callers that speak errno.
    pub fn errno(&self) -> Errno {
        match self {
            LoopError::NoFreeDevice { .. } | LoopError::NotLoopDevice { .. } => Errno::ENOENT,
            LoopError::DeviceInUse { .. } => Errno::EBUSY,
            LoopError::BackingFile { source, .. }
            | LoopError::OpenDevice { source, .. }
            | LoopError::Status { source, .. }
            | LoopError::Bind { source, .. }
            | LoopError::Release { source, .. } => source.errno(),
        }
    }
}
