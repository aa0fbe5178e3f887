//! Kernel loop-device ABI.
//!
//! `LOOP_SET_FD` and `LOOP_CLR_FD` are the same on every kernel. Status queries use either the
//! legacy `loop_info` layout or `loop_info64`; the `legacy-abi` feature picks one at build time.

use std::ffi::{OsStr, OsString};
use std::os::fd::RawFd;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

#[cfg(feature = "legacy-abi")]
mod legacy;
#[cfg(feature = "legacy-abi")]
pub(crate) use legacy::{get_status, set_status};

#[cfg(not(feature = "legacy-abi"))]
mod modern;
#[cfg(not(feature = "legacy-abi"))]
pub(crate) use modern::{get_status, set_status};

/// Size of the kernel's `lo_file_name` field, terminating NUL included.
pub const LO_NAME_SIZE: usize = 64;
pub(crate) const LO_KEY_SIZE: usize = 32;

const LOOP_SET_FD: u32 = 0x4C00;
const LOOP_CLR_FD: u32 = 0x4C01;

nix::ioctl_write_int_bad!(loop_set_fd, LOOP_SET_FD);
nix::ioctl_none_bad!(loop_clr_fd, LOOP_CLR_FD);

pub(crate) fn set_fd(device: RawFd, backing: RawFd) -> nix::Result<()> {
    // SAFETY: LOOP_SET_FD takes the backing descriptor by value; the kernel grabs its own
    // reference, nothing in this process is written.
    unsafe { loop_set_fd(device, backing) }.map(drop)
}

pub(crate) fn clr_fd(device: RawFd) -> nix::Result<()> {
    // SAFETY: LOOP_CLR_FD takes no argument.
    unsafe { loop_clr_fd(device) }.map(drop)
}

/// A loop binding as seen by callers, independent of the kernel layout in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopInfo {
    /// Kernel device number (`lo_number`). Ignored when setting status.
    pub number: u32,
    /// Backing file name, at most `LO_NAME_SIZE - 1` bytes.
    pub file_name: OsString,
    /// Byte offset into the backing file.
    pub offset: u64,
}

impl LoopInfo {
    /// Status for binding `file` at `offset`. Names longer than the kernel field are cut.
    pub fn new(file: &Path, offset: u64) -> Self {
        let bytes = file.as_os_str().as_bytes();
        let len = bytes.len().min(LO_NAME_SIZE - 1);
        Self {
            number: 0,
            file_name: OsString::from_vec(bytes[..len].to_vec()),
            offset,
        }
    }

    /// Reuse check: file name and offset only.
    pub fn matches(&self, file: &Path, offset: u64) -> bool {
        self.offset == offset && self.file_name.as_os_str() == file.as_os_str()
    }

    pub fn file_name_path(&self) -> &Path {
        Path::new(&self.file_name)
    }
}

pub(crate) fn name_to_raw(name: &OsStr) -> [u8; LO_NAME_SIZE] {
    let mut raw = [0u8; LO_NAME_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(LO_NAME_SIZE - 1);
    raw[..len].copy_from_slice(&bytes[..len]);
    raw
}

pub(crate) fn name_from_raw(raw: &[u8]) -> OsString {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    OsString::from_vec(raw[..len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_truncates_long_names() {
        let long = format!("/srv/images/{}", "x".repeat(100));
        let info = LoopInfo::new(Path::new(&long), 0);
        assert_eq!(info.file_name.len(), LO_NAME_SIZE - 1);
        assert!(!info.matches(Path::new(&long), 0));
    }

    #[test]
    fn matches_requires_name_and_offset() {
        let info = LoopInfo::new(Path::new("/data/image.img"), 512);
        assert!(info.matches(Path::new("/data/image.img"), 512));
        assert!(!info.matches(Path::new("/data/image.img"), 0));
        assert!(!info.matches(Path::new("/data/other.img"), 512));
    }

    #[test]
    fn raw_name_is_nul_terminated() {
        let raw = name_to_raw(OsStr::new(&"a".repeat(80)));
        assert_eq!(raw[LO_NAME_SIZE - 1], 0);
        assert_eq!(name_from_raw(&raw).len(), LO_NAME_SIZE - 1);

        let raw = name_to_raw(OsStr::new("/data/image.img"));
        assert_eq!(name_from_raw(&raw), OsString::from("/data/image.img"));
    }
}
