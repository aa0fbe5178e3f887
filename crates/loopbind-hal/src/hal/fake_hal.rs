//! Fake HAL implementation for testing.
//!
//! Models loop device nodes and backing files in memory and records every call, so allocation
//! logic can be tested in CI without root privileges or real devices.

use super::{Access, LoopInfo, LoopOps};
use crate::path::loop_device_path;
use crate::HalResult;
use nix::errno::Errno;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    OpenBacking {
        path: PathBuf,
        access: Access,
    },
    Stat {
        path: PathBuf,
    },
    OpenDevice {
        path: PathBuf,
        access: Access,
    },
    GetStatus {
        device: PathBuf,
    },
    SetFd {
        device: PathBuf,
        backing: PathBuf,
    },
    SetStatus {
        device: PathBuf,
        file_name: OsString,
        offset: u64,
    },
    ClrFd {
        device: PathBuf,
    },
    Close {
        path: PathBuf,
    },
}

/// Binding held by a fake device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeBinding {
    pub info: LoopInfo,
    pub backing: PathBuf,
    pub read_only: bool,
}

/// A node in the fake `/dev`.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    number: u32,
    block: bool,
    read_only: bool,
    open_error: Option<Errno>,
    status_error: Option<Errno>,
    set_fd_error: Option<Errno>,
    set_status_error: Option<Errno>,
    binding: Option<FakeBinding>,
    racer: Option<LoopInfo>,
}

impl FakeDevice {
    /// A free loop block device.
    pub fn loop_node(number: u32) -> Self {
        Self {
            number,
            block: true,
            ..Default::default()
        }
    }

    /// Something that exists at a device path but is not a block device.
    pub fn not_block() -> Self {
        Self::default()
    }

    /// Lives on a read-only filesystem: read-write opens fail with `EROFS`.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn open_error(mut self, errno: Errno) -> Self {
        self.open_error = Some(errno);
        self
    }

    pub fn status_error(mut self, errno: Errno) -> Self {
        self.status_error = Some(errno);
        self
    }

    pub fn set_fd_error(mut self, errno: Errno) -> Self {
        self.set_fd_error = Some(errno);
        self
    }

    pub fn set_status_error(mut self, errno: Errno) -> Self {
        self.set_status_error = Some(errno);
        self
    }

    /// Already bound, e.g. by another process.
    pub fn bound(mut self, file: impl AsRef<Path>, offset: u64) -> Self {
        self.binding = Some(self.binding_for(file.as_ref(), offset));
        self
    }

    /// Another process binds `file` right after the next probe reports this device unbound.
    pub fn raced_by(mut self, file: impl AsRef<Path>, offset: u64) -> Self {
        self.racer = Some(LoopInfo::new(file.as_ref(), offset));
        self
    }

    fn binding_for(&self, file: &Path, offset: u64) -> FakeBinding {
        FakeBinding {
            info: LoopInfo {
                number: self.number,
                ..LoopInfo::new(file, offset)
            },
            backing: file.to_path_buf(),
            read_only: false,
        }
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    devices: BTreeMap<PathBuf, FakeDevice>,
    /// Backing files and whether they may be opened read-write.
    files: BTreeMap<PathBuf, bool>,
    open_handles: usize,
}

/// Open descriptor handed out by [`FakeHal`]. Dropping it records a `Close`.
#[derive(Debug)]
pub struct FakeHandle {
    path: PathBuf,
    access: Access,
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.open_handles = state.open_handles.saturating_sub(1);
        state.operations.push(Operation::Close {
            path: self.path.clone(),
        });
    }
}

/// Fake HAL implementation that models loop devices without touching the kernel.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// `/dev/loop0` .. `/dev/loop{count - 1}`, all free.
    pub fn with_loop_devices(count: u32) -> Self {
        let hal = Self::new();
        for number in 0..count {
            hal.add_device(
                loop_device_path("/dev/loop", number),
                FakeDevice::loop_node(number),
            );
        }
        hal
    }

    pub fn add_device(&self, path: impl Into<PathBuf>, device: FakeDevice) {
        self.state().devices.insert(path.into(), device);
    }

    /// Replace a device node, e.g. to inject a failure after setup.
    pub fn update_device(
        &self,
        path: impl AsRef<Path>,
        update: impl FnOnce(FakeDevice) -> FakeDevice,
    ) {
        let mut state = self.state();
        if let Some(device) = state.devices.remove(path.as_ref()) {
            state
                .devices
                .insert(path.as_ref().to_path_buf(), update(device));
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, writable: bool) {
        self.state().files.insert(path.into(), writable);
    }

    /// Current binding of a device node, if any.
    pub fn binding(&self, path: impl AsRef<Path>) -> Option<FakeBinding> {
        self.state()
            .devices
            .get(path.as_ref())
            .and_then(|device| device.binding.clone())
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state().operations.iter().any(check)
    }

    /// Count recorded operations matching `check`.
    pub fn count_operations(&self, check: impl Fn(&Operation) -> bool) -> usize {
        self.state().operations.iter().filter(|op| check(op)).count()
    }

    /// Descriptors handed out and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    /// Clear recorded operations. Devices and bindings are kept.
    pub fn clear(&self) {
        self.state().operations.clear();
    }

    fn state(&self) -> MutexGuard<'_, FakeHalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_operation(&self, op: Operation) {
        self.state().operations.push(op);
    }

    fn handle(&self, path: &Path, access: Access) -> FakeHandle {
        self.state().open_handles += 1;
        FakeHandle {
            path: path.to_path_buf(),
            access,
            state: Arc::clone(&self.state),
        }
    }

    fn with_device<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut FakeDevice) -> HalResult<T>,
    ) -> HalResult<T> {
        let mut state = self.state();
        let device = state.devices.get_mut(path).ok_or(Errno::ENODEV)?;
        f(device)
    }
}

impl LoopOps for FakeHal {
    type Device = FakeHandle;
    type Backing = FakeHandle;

    fn open_backing(&self, path: &Path, access: Access) -> HalResult<FakeHandle> {
        self.record_operation(Operation::OpenBacking {
            path: path.to_path_buf(),
            access,
        });

        let writable = *self.state().files.get(path).ok_or(Errno::ENOENT)?;
        if access == Access::ReadWrite && !writable {
            return Err(Errno::EACCES.into());
        }

        log::info!("FAKE HAL: open {} ({:?})", path.display(), access);
        Ok(self.handle(path, access))
    }

    fn is_block_device(&self, path: &Path) -> HalResult<bool> {
        self.record_operation(Operation::Stat {
            path: path.to_path_buf(),
        });

        let state = self.state();
        let device = state.devices.get(path).ok_or(Errno::ENOENT)?;
        Ok(device.block)
    }

    fn open_device(&self, path: &Path, access: Access) -> HalResult<FakeHandle> {
        self.record_operation(Operation::OpenDevice {
            path: path.to_path_buf(),
            access,
        });

        {
            let state = self.state();
            let device = state.devices.get(path).ok_or(Errno::ENOENT)?;
            if let Some(errno) = device.open_error {
                return Err(errno.into());
            }
            if access == Access::ReadWrite && device.read_only {
                return Err(Errno::EROFS.into());
            }
        }

        log::info!("FAKE HAL: open {} ({:?})", path.display(), access);
        Ok(self.handle(path, access))
    }

    fn get_status(&self, device: &FakeHandle) -> HalResult<LoopInfo> {
        self.record_operation(Operation::GetStatus {
            device: device.path.clone(),
        });

        self.with_device(&device.path, |dev| {
            if let Some(errno) = dev.status_error {
                return Err(errno.into());
            }
            if let Some(binding) = &dev.binding {
                return Ok(binding.info.clone());
            }
            if let Some(racer) = dev.racer.take() {
                log::info!(
                    "FAKE HAL: {} claimed by a concurrent binder",
                    device.path.display()
                );
                dev.binding = Some(dev.binding_for(racer.file_name_path(), racer.offset));
            }
            Err(Errno::ENXIO.into())
        })
    }

    fn set_fd(&self, device: &FakeHandle, backing: &FakeHandle) -> HalResult<()> {
        self.record_operation(Operation::SetFd {
            device: device.path.clone(),
            backing: backing.path.clone(),
        });

        self.with_device(&device.path, |dev| {
            if let Some(errno) = dev.set_fd_error {
                return Err(errno.into());
            }
            if dev.binding.is_some() {
                return Err(Errno::EBUSY.into());
            }
            dev.binding = Some(FakeBinding {
                info: LoopInfo {
                    number: dev.number,
                    ..LoopInfo::default()
                },
                backing: backing.path.clone(),
                read_only: device.access == Access::ReadOnly
                    || backing.access == Access::ReadOnly,
            });
            log::info!(
                "FAKE HAL: LOOP_SET_FD {} -> {}",
                device.path.display(),
                backing.path.display()
            );
            Ok(())
        })
    }

    fn set_status(&self, device: &FakeHandle, info: &LoopInfo) -> HalResult<()> {
        self.record_operation(Operation::SetStatus {
            device: device.path.clone(),
            file_name: info.file_name.clone(),
            offset: info.offset,
        });

        self.with_device(&device.path, |dev| {
            let binding = dev.binding.as_mut().ok_or(Errno::ENXIO)?;
            if let Some(errno) = dev.set_status_error {
                return Err(errno.into());
            }
            // The kernel keeps only what fits in lo_file_name.
            let bounded = LoopInfo::new(info.file_name_path(), info.offset);
            binding.info.file_name = bounded.file_name;
            binding.info.offset = bounded.offset;
            Ok(())
        })
    }

    fn clr_fd(&self, device: &FakeHandle) -> HalResult<()> {
        self.record_operation(Operation::ClrFd {
            device: device.path.clone(),
        });

        self.with_device(&device.path, |dev| {
            dev.binding.take().ok_or(Errno::ENXIO)?;
            log::info!("FAKE HAL: LOOP_CLR_FD {}", device.path.display());
            Ok(())
        })
    }
}
