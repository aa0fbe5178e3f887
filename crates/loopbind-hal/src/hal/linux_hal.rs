//! Linux HAL implementation using real system calls.

use super::{abi, Access, LoopInfo, LoopOps};
use crate::HalResult;
use nix::sys::stat::{stat, SFlag};
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

fn open_with(path: &Path, access: Access) -> HalResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(access == Access::ReadWrite)
        .open(path)?;
    Ok(file)
}

impl LoopOps for LinuxHal {
    type Device = File;
    type Backing = File;

    fn open_backing(&self, path: &Path, access: Access) -> HalResult<File> {
        open_with(path, access)
    }

    fn is_block_device(&self, path: &Path) -> HalResult<bool> {
        let st = stat(path)?;
        let kind = SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT;
        Ok(kind == SFlag::S_IFBLK)
    }

    fn open_device(&self, path: &Path, access: Access) -> HalResult<File> {
        open_with(path, access)
    }

    fn get_status(&self, device: &File) -> HalResult<LoopInfo> {
        Ok(abi::get_status(device.as_raw_fd())?)
    }

    fn set_fd(&self, device: &File, backing: &File) -> HalResult<()> {
        abi::set_fd(device.as_raw_fd(), backing.as_raw_fd())?;
        Ok(())
    }

    fn set_status(&self, device: &File, info: &LoopInfo) -> HalResult<()> {
        abi::set_status(device.as_raw_fd(), info)?;
        Ok(())
    }

    fn clr_fd(&self, device: &File) -> HalResult<()> {
        abi::clr_fd(device.as_raw_fd())?;
        Ok(())
    }
}
