//! HAL trait definitions and implementations.
//!
//! This module defines the loop device primitives and provides both real (LinuxHal) and fake
//! (FakeHal) implementations.

mod abi;
pub mod fake_hal;
pub mod guards;
pub mod linux_hal;
pub mod loop_ops;

pub use abi::{LoopInfo, LO_NAME_SIZE};
pub use fake_hal::{FakeBinding, FakeDevice, FakeHal, FakeHandle, Operation};
pub use guards::{BindGuard, LoopGuard};
pub use linux_hal::LinuxHal;
pub use loop_ops::{Access, LoopOps};
