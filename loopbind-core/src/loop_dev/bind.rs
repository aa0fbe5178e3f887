use loopbind_error::HalResult;
use loopbind_hal::{BindGuard, LoopInfo, LoopOps};
use std::path::Path;

/// Associate `backing` with an unbound `device` and record `file` / `offset` in its status.
///
/// Two ioctls: `LOOP_SET_FD`, then set status. If the second fails the association made by the
/// first is cleared before the error is returned. A failed `LOOP_SET_FD` clears nothing: the
/// device may belong to whoever won the race for it.
pub fn bind<H: LoopOps + ?Sized>(
    hal: &H,
    device: &H::Device,
    backing: &H::Backing,
    file: &Path,
    offset: u64,
) -> HalResult<()> {
    hal.set_fd(device, backing)?;
    let guard = BindGuard::new(hal, device);
    hal.set_status(device, &LoopInfo::new(file, offset))?;
    guard.commit();
    Ok(())
}
