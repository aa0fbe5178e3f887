//! Loop device allocation and release.
//!
//! [`set_loop`] binds a file to the first free loop device (or reuses one already bound to the
//! same file and offset); [`del_loop`] clears a binding. Both run against any [`hal::LoopOps`]
//! backend.

pub mod config;
pub mod logging;
pub mod loop_dev;

pub use config::{load_config, LoopConfig};
pub use loop_dev::{
    bind, del_loop, loop_status, probe, set_loop, Attached, DeviceStatus, SetLoopStatus,
};
pub use loopbind_error::{LoopError, LoopResult};
pub use loopbind_hal as hal;
