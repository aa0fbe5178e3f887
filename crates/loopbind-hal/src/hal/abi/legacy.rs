//! Pre-2.6 `loop_info` status ioctls.
//!
//! The struct is declared locally; the libc crate does not describe it.

use super::{name_from_raw, name_to_raw, LoopInfo, LO_KEY_SIZE, LO_NAME_SIZE};
use libc::{c_int, c_ulong};
use nix::errno::Errno;
use std::os::fd::RawFd;

const LOOP_SET_STATUS: u32 = 0x4C02;
const LOOP_GET_STATUS: u32 = 0x4C03;

// __kernel_old_dev_t
#[cfg(target_arch = "x86_64")]
type OldDev = c_ulong;
#[cfg(target_arch = "x86")]
type OldDev = libc::c_ushort;
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
type OldDev = libc::c_uint;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct LegacyLoopInfo {
    lo_number: c_int,
    lo_device: OldDev,
    lo_inode: c_ulong,
    lo_rdevice: OldDev,
    lo_offset: c_int,
    lo_encrypt_type: c_int,
    lo_encrypt_key_size: c_int,
    lo_flags: c_int,
    lo_name: [u8; LO_NAME_SIZE],
    lo_encrypt_key: [u8; LO_KEY_SIZE],
    lo_init: [c_ulong; 2],
    reserved: [u8; 4],
}

impl Default for LegacyLoopInfo {
    fn default() -> Self {
        Self {
            lo_number: 0,
            lo_device: 0,
            lo_inode: 0,
            lo_rdevice: 0,
            lo_offset: 0,
            lo_encrypt_type: 0,
            lo_encrypt_key_size: 0,
            lo_flags: 0,
            lo_name: [0; LO_NAME_SIZE],
            lo_encrypt_key: [0; LO_KEY_SIZE],
            lo_init: [0; 2],
            reserved: [0; 4],
        }
    }
}

impl TryFrom<&LoopInfo> for LegacyLoopInfo {
    type Error = Errno;

    // The legacy offset is a C int; larger offsets cannot be expressed.
    fn try_from(info: &LoopInfo) -> Result<Self, Errno> {
        let lo_offset = c_int::try_from(info.offset).map_err(|_| Errno::EOVERFLOW)?;
        Ok(Self {
            lo_offset,
            lo_name: name_to_raw(&info.file_name),
            ..Default::default()
        })
    }
}

impl From<&LegacyLoopInfo> for LoopInfo {
    fn from(raw: &LegacyLoopInfo) -> Self {
        Self {
            number: u32::try_from(raw.lo_number).unwrap_or_default(),
            file_name: name_from_raw(&raw.lo_name),
            offset: u64::try_from(raw.lo_offset).unwrap_or_default(),
        }
    }
}

nix::ioctl_read_bad!(loop_get_status, LOOP_GET_STATUS, LegacyLoopInfo);
nix::ioctl_write_ptr_bad!(loop_set_status, LOOP_SET_STATUS, LegacyLoopInfo);

pub(crate) fn get_status(device: RawFd) -> nix::Result<LoopInfo> {
    let mut raw = LegacyLoopInfo::default();
    // SAFETY: `raw` is a writable loop_info that outlives the call.
    unsafe { loop_get_status(device, &mut raw) }?;
    Ok(LoopInfo::from(&raw))
}

pub(crate) fn set_status(device: RawFd, info: &LoopInfo) -> nix::Result<()> {
    let raw = LegacyLoopInfo::try_from(info)?;
    // SAFETY: the kernel only reads `raw`.
    unsafe { loop_set_status(device, &raw) }.map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn layout_matches_kernel() {
        assert_eq!(std::mem::size_of::<LegacyLoopInfo>(), 168);
    }

    #[test]
    fn offsets_beyond_c_int_overflow() {
        let info = LoopInfo::new(Path::new("/data/image.img"), u64::from(u32::MAX));
        let err = LegacyLoopInfo::try_from(&info).unwrap_err();
        assert_eq!(err, Errno::EOVERFLOW);
    }

    #[test]
    fn conversion_keeps_logical_fields() {
        let info = LoopInfo::new(Path::new("/data/image.img"), 4096);
        let raw = LegacyLoopInfo::try_from(&info).unwrap();
        assert_eq!(raw.lo_offset, 4096);
        assert_eq!(LoopInfo::from(&raw), info);
    }
}
