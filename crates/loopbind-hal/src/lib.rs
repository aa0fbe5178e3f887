//! Loopbind Hardware Abstraction Layer (HAL).
//!
//! Everything that touches the kernel goes through [`LoopOps`], so allocation logic can be
//! exercised against [`FakeHal`] without root or real loop devices.

pub mod hal;
pub mod path;

pub use hal::*;
pub use loopbind_error::{HalError, HalResult};
