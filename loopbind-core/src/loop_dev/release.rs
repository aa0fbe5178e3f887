use loopbind_error::{LoopError, LoopResult};
use loopbind_hal::LoopOps;
use std::path::Path;

/// Clear the binding of `device`. One attempt; failure to open and failure to clear are both
/// reported as [`LoopError::Release`].
pub fn del_loop<H: LoopOps + ?Sized>(hal: &H, device: &Path) -> LoopResult<()> {
    hal.detach(device).map_err(|source| LoopError::Release {
        device: device.to_path_buf(),
        source,
    })?;
    log::info!("released {}", device.display());
    Ok(())
}
