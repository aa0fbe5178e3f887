use loopbind_error::{HalResult, LoopError, LoopResult};
use loopbind_hal::{Access, LoopInfo, LoopOps};
use nix::errno::Errno;
use std::path::Path;

/// What a loop device is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Unbound,
    Bound(LoopInfo),
}

/// Query the binding of an open device.
///
/// `ENXIO` means the device has no backing file; every other error is passed through so a
/// failing device is never mistaken for a free one.
pub fn probe<H: LoopOps + ?Sized>(hal: &H, device: &H::Device) -> HalResult<DeviceStatus> {
    match hal.get_status(device) {
        Ok(info) => Ok(DeviceStatus::Bound(info)),
        Err(err) if err.errno() == Errno::ENXIO => Ok(DeviceStatus::Unbound),
        Err(err) => Err(err),
    }
}

/// Open `device` read-only and probe it.
pub fn loop_status<H: LoopOps + ?Sized>(hal: &H, device: &Path) -> LoopResult<DeviceStatus> {
    let handle = hal
        .open_device(device, Access::ReadOnly)
        .map_err(|source| LoopError::OpenDevice {
            device: device.to_path_buf(),
            source,
        })?;
    probe(hal, &handle).map_err(|source| LoopError::Status {
        device: device.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopbind_hal::{FakeDevice, FakeHal};

    #[test]
    fn probe_distinguishes_unbound_bound_and_failing() {
        let hal = FakeHal::new();
        hal.add_device("/dev/loop0", FakeDevice::loop_node(0));
        hal.add_device(
            "/dev/loop1",
            FakeDevice::loop_node(1).bound("/data/image.img", 4096),
        );
        hal.add_device("/dev/loop2", FakeDevice::loop_node(2).status_error(Errno::EIO));

        assert_eq!(
            loop_status(&hal, Path::new("/dev/loop0")).unwrap(),
            DeviceStatus::Unbound
        );

        match loop_status(&hal, Path::new("/dev/loop1")).unwrap() {
            DeviceStatus::Bound(info) => {
                assert_eq!(info.number, 1);
                assert!(info.matches(Path::new("/data/image.img"), 4096));
            }
            other => panic!("expected a binding, got {:?}", other),
        }

        let err = loop_status(&hal, Path::new("/dev/loop2")).unwrap_err();
        assert!(matches!(err, LoopError::Status { .. }));
        assert_eq!(err.errno(), Errno::EIO);
    }

    #[test]
    fn loop_status_of_missing_device_fails_to_open() {
        let hal = FakeHal::new();
        let err = loop_status(&hal, Path::new("/dev/loop9")).unwrap_err();
        assert!(matches!(err, LoopError::OpenDevice { .. }));
        assert_eq!(hal.open_handles(), 0);
    }
}
