//! Loop device primitives.

use super::LoopInfo;
use crate::HalResult;
use std::path::Path;

/// Open mode of a backing file or device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

/// Kernel operations needed to bind and release loop devices.
///
/// Handles are scoped: dropping one closes the underlying descriptor.
pub trait LoopOps {
    /// Open loop device node.
    type Device;
    /// Open backing file.
    type Backing;

    fn open_backing(&self, path: &Path, access: Access) -> HalResult<Self::Backing>;

    /// `stat` the path and report whether it is a block device.
    fn is_block_device(&self, path: &Path) -> HalResult<bool>;

    fn open_device(&self, path: &Path, access: Access) -> HalResult<Self::Device>;

    /// Current binding. An unbound device fails with `ENXIO`.
    fn get_status(&self, device: &Self::Device) -> HalResult<LoopInfo>;

    /// `LOOP_SET_FD`: associate the backing file with the device. Fails with `EBUSY` if the
    /// device is already bound.
    fn set_fd(&self, device: &Self::Device, backing: &Self::Backing) -> HalResult<()>;

    /// Set file name and offset of a bound device.
    fn set_status(&self, device: &Self::Device, info: &LoopInfo) -> HalResult<()>;

    /// `LOOP_CLR_FD`.
    fn clr_fd(&self, device: &Self::Device) -> HalResult<()>;

    /// Open `path` read-only and clear its binding.
    fn detach(&self, path: &Path) -> HalResult<()> {
        let device = self.open_device(path, Access::ReadOnly)?;
        self.clr_fd(&device)
    }
}
