//! Configuration for VhdLite tools.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vhdlite_shared::constants::defaults::{DEFAULT_BLOCK_SIZE_MB, DEFAULT_DISK_SIZE_GB};
use vhdlite_shared::errors::{VhdliteError, VhdliteResult};

use crate::virtdisk::{CreateDiskOptions, CreateVirtualDiskFlags, DiskFormat};

pub mod envs {
    /// Path to a JSON options file.
    pub const VHDLITE_CONFIG: &str = "VHDLITE_CONFIG";
}

/// Defaults applied when a request leaves a value unspecified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VhdliteOptions {
    /// Maximum size for new disks, in GB.
    ///
    /// Default: 10
    #[serde(default = "default_size_gb")]
    pub default_size_gb: u32,

    /// Block allocation size for new disks, in MB.
    ///
    /// Default: 1
    #[serde(default = "default_block_size_mb")]
    pub default_block_size_mb: u32,

    /// Format for new disks. `auto` follows the file extension.
    #[serde(default)]
    pub format: DiskFormat,

    /// Allocate the full size up front instead of growing on demand.
    #[serde(default)]
    pub full_allocation: bool,
}

fn default_size_gb() -> u32 {
    DEFAULT_DISK_SIZE_GB
}

fn default_block_size_mb() -> u32 {
    DEFAULT_BLOCK_SIZE_MB
}

impl Default for VhdliteOptions {
    fn default() -> Self {
        Self {
            default_size_gb: default_size_gb(),
            default_block_size_mb: default_block_size_mb(),
            format: DiskFormat::Auto,
            full_allocation: false,
        }
    }
}

impl VhdliteOptions {
    /// Load options from a JSON file.
    pub fn load(path: &Path) -> VhdliteResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VhdliteError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            VhdliteError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load from `explicit`, else from `$VHDLITE_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> VhdliteResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(envs::VHDLITE_CONFIG) {
            Some(path) if !path.is_empty() => Self::load(&PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    /// Create options for a plain disk, with per-request overrides.
    pub fn create_options(
        &self,
        size_gb: Option<u32>,
        block_size_mb: Option<u32>,
    ) -> VhdliteResult<CreateDiskOptions> {
        let mut options = CreateDiskOptions::sized(
            size_gb.unwrap_or(self.default_size_gb),
            block_size_mb.unwrap_or(self.default_block_size_mb),
        )?
        .with_format(self.format);

        if self.full_allocation {
            options = options.with_flags(CreateVirtualDiskFlags::FULL_PHYSICAL_ALLOCATION);
        }
        Ok(options)
    }
}
