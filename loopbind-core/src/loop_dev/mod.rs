//! Loop device lifecycle: probe, bind, allocate, release.

mod allocate;
mod bind;
mod probe;
mod release;

pub use allocate::{set_loop, Attached, SetLoopStatus};
pub use bind::bind;
pub use probe::{loop_status, probe, DeviceStatus};
pub use release::del_loop;
