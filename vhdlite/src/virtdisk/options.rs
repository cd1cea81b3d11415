//! Caller-facing descriptions of create and open requests.
//!
//! These are plain serde types; the service turns them into version 2
//! parameter blocks right before the native call.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vhdlite_shared::constants::units::{BYTES_PER_GB, BYTES_PER_MB};

use super::abi::VirtualStorageType;
use super::error::VirtDiskError;
use super::flags::{CreateVirtualDiskFlags, OpenVirtualDiskFlags, VirtualDiskAccess};

/// Virtual disk format requested from the native service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormat {
    /// Inferred from the file extension.
    #[default]
    Auto,
    Vhd,
    Vhdx,
    VhdSet,
    Iso,
}

impl DiskFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Auto => "auto",
            DiskFormat::Vhd => "vhd",
            DiskFormat::Vhdx => "vhdx",
            DiskFormat::VhdSet => "vhdset",
            DiskFormat::Iso => "iso",
        }
    }

    pub fn storage_type(&self) -> VirtualStorageType {
        match self {
            DiskFormat::Auto => VirtualStorageType::DEFAULT,
            DiskFormat::Vhd => VirtualStorageType::VHD,
            DiskFormat::Vhdx => VirtualStorageType::VHDX,
            DiskFormat::VhdSet => VirtualStorageType::VHDSET,
            DiskFormat::Iso => VirtualStorageType::ISO,
        }
    }
}

/// Convert a size in GB to bytes. Cannot overflow for any `u32` input.
pub fn gb_to_bytes(size_gb: u32) -> u64 {
    u64::from(size_gb) * BYTES_PER_GB
}

/// Convert a block size in MB to bytes, or `None` if it does not fit the
/// native 32-bit field.
pub fn mb_to_block_bytes(size_mb: u32) -> Option<u32> {
    let bytes = u64::from(size_mb) * BYTES_PER_MB;
    u32::try_from(bytes).ok()
}

// ============================================================================
// Create
// ============================================================================

/// Describes a new virtual disk image.
///
/// Create requests are always sent with `VIRTUAL_DISK_ACCESS_NONE`: the disk
/// is created but not attached.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDiskOptions {
    /// Maximum logical size in bytes.
    ///
    /// 0 on a differencing disk inherits the parent's size.
    #[serde(default)]
    pub max_size_bytes: u64,

    /// Block allocation size in bytes. 0 lets the service choose.
    #[serde(default)]
    pub block_size_bytes: u32,

    /// Logical sector size in bytes. 0 lets the service choose.
    #[serde(default)]
    pub sector_size_bytes: u32,

    /// Parent image for a differencing disk.
    #[serde(default)]
    pub parent_path: Option<PathBuf>,

    /// Source image to copy data from.
    #[serde(default)]
    pub source_path: Option<PathBuf>,

    #[serde(default)]
    pub flags: CreateVirtualDiskFlags,

    #[serde(default)]
    pub format: DiskFormat,

    /// Identifier stamped into the new image. Nil lets the service pick.
    #[serde(default)]
    pub unique_id: Option<Uuid>,

    #[serde(default)]
    pub resiliency_id: Option<Uuid>,
}

impl CreateDiskOptions {
    /// Plain dynamic disk of `max_size_gb` GB with `block_size_mb` MB blocks.
    pub fn sized(max_size_gb: u32, block_size_mb: u32) -> Result<Self, VirtDiskError> {
        let block_size_bytes = mb_to_block_bytes(block_size_mb).ok_or_else(|| {
            VirtDiskError::InvalidArgument(format!(
                "block size {}MB exceeds the 32-bit native limit",
                block_size_mb
            ))
        })?;

        Ok(Self {
            max_size_bytes: gb_to_bytes(max_size_gb),
            block_size_bytes,
            ..Default::default()
        })
    }

    /// Differencing disk on top of `parent`, inheriting its size.
    pub fn differencing(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent_path: Some(parent.into()),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source_path = Some(source.into());
        self
    }

    pub fn with_flags(mut self, flags: CreateVirtualDiskFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_format(mut self, format: DiskFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sector_size(mut self, sector_size_bytes: u32) -> Self {
        self.sector_size_bytes = sector_size_bytes;
        self
    }

    pub fn with_resiliency_id(mut self, id: Uuid) -> Self {
        self.resiliency_id = Some(id);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), VirtDiskError> {
        if self.max_size_bytes == 0 && self.parent_path.is_none() && self.source_path.is_none() {
            return Err(VirtDiskError::InvalidArgument(
                "maximum size is required unless a parent or source disk is given".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Open
// ============================================================================

/// How to open an existing virtual disk image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDiskOptions {
    #[serde(default)]
    pub access: VirtualDiskAccess,

    #[serde(default)]
    pub flags: OpenVirtualDiskFlags,

    /// Send a version 2 parameter block. Version 2 requires
    /// `VIRTUAL_DISK_ACCESS_NONE`.
    #[serde(default = "default_send_parameters")]
    pub send_parameters: bool,

    /// Open for metadata queries only.
    #[serde(default)]
    pub get_info_only: bool,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub resiliency_id: Option<Uuid>,

    #[serde(default)]
    pub format: DiskFormat,
}

fn default_send_parameters() -> bool {
    true
}

impl Default for OpenDiskOptions {
    fn default() -> Self {
        Self {
            access: VirtualDiskAccess::NONE,
            flags: OpenVirtualDiskFlags::NONE,
            send_parameters: default_send_parameters(),
            get_info_only: false,
            read_only: false,
            resiliency_id: None,
            format: DiskFormat::Auto,
        }
    }
}

impl OpenDiskOptions {
    /// Open for detaching: detach access, no flags, no parameter block.
    pub fn detach() -> Self {
        Self {
            access: VirtualDiskAccess::DETACH,
            send_parameters: false,
            ..Default::default()
        }
    }

    /// Open for surface cache policy changes: cached I/O, tolerant of
    /// differencing disks whose parent moved.
    pub fn cache_bypass() -> Self {
        Self {
            flags: OpenVirtualDiskFlags::CACHED_IO
                | OpenVirtualDiskFlags::IGNORE_RELATIVE_PARENT_LOCATOR,
            ..Default::default()
        }
    }

    /// Metadata-only open.
    pub fn info_only() -> Self {
        Self {
            get_info_only: true,
            ..Default::default()
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_flags(mut self, flags: OpenVirtualDiskFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), VirtDiskError> {
        if self.send_parameters && !self.access.is_empty() {
            return Err(VirtDiskError::InvalidArgument(format!(
                "version 2 open parameters require access NONE, got {:#x}",
                self.access.bits()
            )));
        }

        if !self.send_parameters
            && (self.get_info_only || self.read_only || self.resiliency_id.is_some())
        {
            return Err(VirtDiskError::InvalidArgument(
                "info-only, read-only and resiliency id need a parameter block".into(),
            ));
        }

        Ok(())
    }
}
