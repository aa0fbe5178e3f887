use crate::LoopOps;
use std::path::{Path, PathBuf};

/// RAII guard that undoes a `LOOP_SET_FD` unless the binding is committed.
///
/// Armed only after `set_fd` succeeded, so it never clears a binding this process does not own.
pub struct BindGuard<'a, H: LoopOps + ?Sized> {
    hal: &'a H,
    device: &'a H::Device,
    active: bool,
}

impl<'a, H: LoopOps + ?Sized> BindGuard<'a, H> {
    pub fn new(hal: &'a H, device: &'a H::Device) -> Self {
        Self {
            hal,
            device,
            active: true,
        }
    }

    /// Keep the association.
    pub fn commit(mut self) {
        self.active = false;
    }
}

impl<'a, H: LoopOps + ?Sized> Drop for BindGuard<'a, H> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = self.hal.clr_fd(self.device) {
            log::warn!("bind guard failed to clear partial binding: {}", err);
        }
    }
}

/// RAII guard that detaches a loop device when dropped.
#[derive(Debug)]
pub struct LoopGuard<'a, H: LoopOps + ?Sized> {
    hal: &'a H,
    device: PathBuf,
    active: bool,
}

impl<'a, H: LoopOps + ?Sized> LoopGuard<'a, H> {
    pub fn new(hal: &'a H, device: impl Into<PathBuf>) -> Self {
        Self {
            hal,
            device: device.into(),
            active: true,
        }
    }

    /// Prevent automatic detach and return the loop device path.
    pub fn release(mut self) -> PathBuf {
        self.active = false;
        std::mem::take(&mut self.device)
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl<'a, H: LoopOps + ?Sized> Drop for LoopGuard<'a, H> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = self.hal.detach(&self.device) {
            log::warn!(
                "loop guard failed to detach {}: {}",
                self.device.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Access, FakeDevice, FakeHal, LoopInfo, Operation};

    #[test]
    fn bind_guard_clears_on_drop() {
        let hal = FakeHal::with_loop_devices(1);
        hal.add_file("/data/image.img", true);
        let device = hal
            .open_device(Path::new("/dev/loop0"), Access::ReadWrite)
            .unwrap();
        let backing = hal
            .open_backing(Path::new("/data/image.img"), Access::ReadWrite)
            .unwrap();

        hal.set_fd(&device, &backing).unwrap();
        {
            let _guard = BindGuard::new(&hal, &device);
        }

        assert!(hal.binding("/dev/loop0").is_none());
        assert!(hal.has_operation(|op| matches!(op, Operation::ClrFd { .. })));
    }

    #[test]
    fn bind_guard_commit_keeps_binding() {
        let hal = FakeHal::with_loop_devices(1);
        hal.add_file("/data/image.img", true);
        let device = hal
            .open_device(Path::new("/dev/loop0"), Access::ReadWrite)
            .unwrap();
        let backing = hal
            .open_backing(Path::new("/data/image.img"), Access::ReadWrite)
            .unwrap();

        hal.set_fd(&device, &backing).unwrap();
        let guard = BindGuard::new(&hal, &device);
        hal.set_status(&device, &LoopInfo::new(Path::new("/data/image.img"), 0))
            .unwrap();
        guard.commit();

        assert!(hal.binding("/dev/loop0").is_some());
        assert!(!hal.has_operation(|op| matches!(op, Operation::ClrFd { .. })));
    }

    #[test]
    fn loop_guard_detaches_on_drop() {
        let hal = FakeHal::new();
        hal.add_device(
            "/dev/loop0",
            FakeDevice::loop_node(0).bound("/data/image.img", 0),
        );

        {
            let guard = LoopGuard::new(&hal, "/dev/loop0");
            assert_eq!(guard.device(), Path::new("/dev/loop0"));
        }

        assert!(hal.binding("/dev/loop0").is_none());
        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::OpenDevice {
                access: Access::ReadOnly,
                ..
            }
        )));
    }

    #[test]
    fn loop_guard_release_skips_detach() {
        let hal = FakeHal::new();
        hal.add_device(
            "/dev/loop0",
            FakeDevice::loop_node(0).bound("/data/image.img", 0),
        );

        {
            let guard = LoopGuard::new(&hal, "/dev/loop0");
            assert_eq!(guard.release(), PathBuf::from("/dev/loop0"));
        }

        assert!(hal.binding("/dev/loop0").is_some());
        assert_eq!(hal.operation_count(), 0);
    }
}
