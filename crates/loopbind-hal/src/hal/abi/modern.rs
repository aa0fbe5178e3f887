//! `loop_info64` status ioctls (Linux 2.6 and later).

use super::{name_from_raw, name_to_raw, LoopInfo, LO_KEY_SIZE, LO_NAME_SIZE};
use std::os::fd::RawFd;

const LOOP_SET_STATUS64: u32 = 0x4C04;
const LOOP_GET_STATUS64: u32 = 0x4C05;

// include/uapi/linux/loop.h
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopInfo64 {
    lo_device: u64,
    lo_inode: u64,
    lo_rdevice: u64,
    lo_offset: u64,
    lo_sizelimit: u64,
    lo_number: u32,
    lo_encrypt_type: u32,
    lo_encrypt_key_size: u32,
    lo_flags: u32,
    lo_file_name: [u8; LO_NAME_SIZE],
    lo_crypt_name: [u8; LO_NAME_SIZE],
    lo_encrypt_key: [u8; LO_KEY_SIZE],
    lo_init: [u64; 2],
}

impl Default for LoopInfo64 {
    fn default() -> Self {
        Self {
            lo_device: 0,
            lo_inode: 0,
            lo_rdevice: 0,
            lo_offset: 0,
            lo_sizelimit: 0,
            lo_number: 0,
            lo_encrypt_type: 0,
            lo_encrypt_key_size: 0,
            lo_flags: 0,
            lo_file_name: [0; LO_NAME_SIZE],
            lo_crypt_name: [0; LO_NAME_SIZE],
            lo_encrypt_key: [0; LO_KEY_SIZE],
            lo_init: [0; 2],
        }
    }
}

impl From<&LoopInfo> for LoopInfo64 {
    fn from(info: &LoopInfo) -> Self {
        Self {
            lo_offset: info.offset,
            lo_file_name: name_to_raw(&info.file_name),
            ..Default::default()
        }
    }
}

impl From<&LoopInfo64> for LoopInfo {
    fn from(raw: &LoopInfo64) -> Self {
        Self {
            number: raw.lo_number,
            file_name: name_from_raw(&raw.lo_file_name),
            offset: raw.lo_offset,
        }
    }
}

nix::ioctl_read_bad!(loop_get_status64, LOOP_GET_STATUS64, LoopInfo64);
nix::ioctl_write_ptr_bad!(loop_set_status64, LOOP_SET_STATUS64, LoopInfo64);

pub(crate) fn get_status(device: RawFd) -> nix::Result<LoopInfo> {
    let mut raw = LoopInfo64::default();
    // SAFETY: `raw` is a writable loop_info64 that outlives the call.
    unsafe { loop_get_status64(device, &mut raw) }?;
    Ok(LoopInfo::from(&raw))
}

pub(crate) fn set_status(device: RawFd, info: &LoopInfo) -> nix::Result<()> {
    let raw = LoopInfo64::from(info);
    // SAFETY: the kernel only reads `raw`.
    unsafe { loop_set_status64(device, &raw) }.map(drop)
}
