use anyhow::{Context, Result};
use loopbind_hal::path::loop_device_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DEVICE_PREFIX: &str = "/dev/loop";
pub const DEVFS_DEVICE_PREFIX: &str = "/dev/loop/";

/// Where auto-discovery looks for loop device nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Prefix the zero-based device index is appended to.
    pub device_prefix: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
        }
    }
}

impl LoopConfig {
    /// devfs layout: `/dev/loop/0`, `/dev/loop/1`, ...
    pub fn devfs() -> Self {
        Self {
            device_prefix: DEVFS_DEVICE_PREFIX.to_string(),
        }
    }

    pub fn device_path(&self, index: u32) -> PathBuf {
        loop_device_path(&self.device_prefix, index)
    }
}

/// Load a TOML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        return Ok(LoopConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
