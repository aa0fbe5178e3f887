use std::path::PathBuf;

/// Loop device node for `index` under `prefix` (`/dev/loop` + 3 is `/dev/loop3`).
pub fn loop_device_path(prefix: &str, index: u32) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix, index))
}
