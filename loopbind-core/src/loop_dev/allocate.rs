//! Loop device allocation.
//!
//! Probing a device and binding it are separate ioctls, so another process can claim a device
//! in between. `LOOP_SET_FD` is atomic in the kernel and fails with `EBUSY` for the loser. That
//! failure is returned for a fixed device and skipped during a scan; nothing here locks.

use super::bind::bind;
use super::probe::{probe, DeviceStatus};
use crate::config::LoopConfig;
use loopbind_error::{HalResult, LoopError, LoopResult};
use loopbind_hal::{Access, LoopOps};
use nix::errno::Errno;
use std::path::{Path, PathBuf};

/// A loop device now serving the requested file and offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
    pub device: PathBuf,
    /// Read-only if the backing file or the device could only be opened read-only.
    pub access: Access,
    /// The device was already bound to this file and offset; nothing was changed.
    pub reused: bool,
}

/// Numeric view of an allocation result: 0 read-write, 1 read-only, errno otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetLoopStatus {
    BoundReadWrite,
    BoundReadOnly,
    Failure(Errno),
}

impl SetLoopStatus {
    pub fn code(self) -> i32 {
        match self {
            SetLoopStatus::BoundReadWrite => 0,
            SetLoopStatus::BoundReadOnly => 1,
            SetLoopStatus::Failure(errno) => errno as i32,
        }
    }
}

impl From<&LoopResult<Attached>> for SetLoopStatus {
    fn from(result: &LoopResult<Attached>) -> Self {
        match result {
            Ok(Attached {
                access: Access::ReadWrite,
                ..
            }) => SetLoopStatus::BoundReadWrite,
            Ok(Attached {
                access: Access::ReadOnly,
                ..
            }) => SetLoopStatus::BoundReadOnly,
            Err(err) => SetLoopStatus::Failure(err.errno()),
        }
    }
}

/// Bind `file` at `offset` to a loop device.
///
/// With `device` set only that node is tried and any failure is returned. Otherwise nodes are
/// scanned from index 0 and the first one that is free, or already bound to exactly `file` at
/// `offset`, is used. Devices bound to anything else are skipped, never reclaimed. The scan ends
/// at the first index that is missing or not a block device.
pub fn set_loop<H: LoopOps + ?Sized>(
    hal: &H,
    config: &LoopConfig,
    device: Option<&Path>,
    file: &Path,
    offset: u64,
) -> LoopResult<Attached> {
    let (backing, backing_access) = open_backing(hal, file)?;

    let mut index: u32 = 0;
    let mut last: Option<Errno> = None;
    loop {
        let candidate = match device {
            Some(path) => path.to_path_buf(),
            None => config.device_path(index),
        };

        if !matches!(hal.is_block_device(&candidate), Ok(true)) {
            log::debug!(
                "{}: missing or not a block device, scan ends",
                candidate.display()
            );
            return Err(match device {
                Some(_) => LoopError::NotLoopDevice { device: candidate },
                None => LoopError::NoFreeDevice {
                    scanned: index,
                    last,
                },
            });
        }

        match try_candidate(hal, &candidate, &backing, backing_access, file, offset) {
            Ok(Some(attached)) => return Ok(attached),
            Ok(None) if device.is_some() => {
                return Err(LoopError::DeviceInUse { device: candidate });
            }
            Ok(None) => {}
            Err(err) if device.is_some() => return Err(err),
            Err(err) => {
                log::debug!("{}, trying next device", err);
                last = Some(err.errno());
            }
        }

        index += 1;
    }
}

fn open_backing<H: LoopOps + ?Sized>(hal: &H, file: &Path) -> LoopResult<(H::Backing, Access)> {
    match hal.open_backing(file, Access::ReadWrite) {
        Ok(backing) => Ok((backing, Access::ReadWrite)),
        Err(err) => {
            log::debug!(
                "{}: read-write open failed ({}), trying read-only",
                file.display(),
                err
            );
            hal.open_backing(file, Access::ReadOnly)
                .map(|backing| (backing, Access::ReadOnly))
                .map_err(|source| LoopError::BackingFile {
                    path: file.to_path_buf(),
                    source,
                })
        }
    }
}

/// Open a candidate in `access` mode, falling back to read-only on `EROFS`.
fn open_candidate<H: LoopOps + ?Sized>(
    hal: &H,
    candidate: &Path,
    access: Access,
) -> HalResult<(H::Device, Access)> {
    match hal.open_device(candidate, access) {
        Ok(handle) => Ok((handle, access)),
        Err(err) if access == Access::ReadWrite && err.errno() == Errno::EROFS => {
            log::debug!("{}: read-only filesystem, reopening read-only", candidate.display());
            let handle = hal.open_device(candidate, Access::ReadOnly)?;
            Ok((handle, Access::ReadOnly))
        }
        Err(err) => Err(err),
    }
}

/// `Ok(None)` means the candidate is bound to something else.
fn try_candidate<H: LoopOps + ?Sized>(
    hal: &H,
    candidate: &Path,
    backing: &H::Backing,
    backing_access: Access,
    file: &Path,
    offset: u64,
) -> LoopResult<Option<Attached>> {
    let (handle, access) =
        open_candidate(hal, candidate, backing_access).map_err(|source| LoopError::OpenDevice {
            device: candidate.to_path_buf(),
            source,
        })?;

    let status = probe(hal, &handle).map_err(|source| LoopError::Status {
        device: candidate.to_path_buf(),
        source,
    })?;

    match status {
        DeviceStatus::Unbound => {
            bind(hal, &handle, backing, file, offset).map_err(|source| LoopError::Bind {
                device: candidate.to_path_buf(),
                source,
            })?;
            log::info!(
                "bound {} to {} at offset {} ({:?})",
                file.display(),
                candidate.display(),
                offset,
                access
            );
            Ok(Some(Attached {
                device: candidate.to_path_buf(),
                access,
                reused: false,
            }))
        }
        DeviceStatus::Bound(info) if info.matches(file, offset) => {
            log::info!(
                "reusing {} for {} at offset {}",
                candidate.display(),
                file.display(),
                offset
            );
            Ok(Some(Attached {
                device: candidate.to_path_buf(),
                access,
                reused: true,
            }))
        }
        DeviceStatus::Bound(info) => {
            log::debug!(
                "{}: bound to {} at offset {}, skipping",
                candidate.display(),
                info.file_name_path().display(),
                info.offset
            );
            Ok(None)
        }
    }
}
