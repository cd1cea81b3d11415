//! Typed access masks, operation flags and cache modes.
//!
//! Bit-flag sets are `bitflags` types so only named bits can be combined.
//! The cache mode is an ordinal and is modelled as a plain enum.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vhdlite_shared::constants::{access, cache_mode, create_flags, open_flags};

bitflags! {
    /// `VIRTUAL_DISK_ACCESS_MASK`
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct VirtualDiskAccess: u32 {
        const ATTACH_RO = access::ATTACH_RO;
        const ATTACH_RW = access::ATTACH_RW;
        const DETACH = access::DETACH;
        const GET_INFO = access::GET_INFO;
        const CREATE = access::CREATE;
        const METAOPS = access::METAOPS;
        const READ = access::READ;
        const ALL = access::ALL;
        const WRITABLE = access::WRITABLE;
    }
}

impl VirtualDiskAccess {
    /// `VIRTUAL_DISK_ACCESS_NONE`
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// `CREATE_VIRTUAL_DISK_FLAG`
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CreateVirtualDiskFlags: u32 {
        const FULL_PHYSICAL_ALLOCATION = create_flags::FULL_PHYSICAL_ALLOCATION;
        const PREVENT_WRITES_TO_SOURCE_DISK = create_flags::PREVENT_WRITES_TO_SOURCE_DISK;
        const DO_NOT_COPY_METADATA_FROM_PARENT = create_flags::DO_NOT_COPY_METADATA_FROM_PARENT;
    }
}

impl CreateVirtualDiskFlags {
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// `OPEN_VIRTUAL_DISK_FLAG`
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OpenVirtualDiskFlags: u32 {
        const NO_PARENTS = open_flags::NO_PARENTS;
        const BLANK_FILE = open_flags::BLANK_FILE;
        const BOOT_DRIVE = open_flags::BOOT_DRIVE;
        const CACHED_IO = open_flags::CACHED_IO;
        const CUSTOM_DIFF_CHAIN = open_flags::CUSTOM_DIFF_CHAIN;
        const PARENT_CACHED_IO = open_flags::PARENT_CACHED_IO;
        const VHDSET_FILE_ONLY = open_flags::VHDSET_FILE_ONLY;
        /// Tolerate differencing disks whose parent moved away from the
        /// recorded relative location.
        const IGNORE_RELATIVE_PARENT_LOCATOR = open_flags::IGNORE_RELATIVE_PARENT_LOCATOR;
        const NO_WRITE_HARDENING = open_flags::NO_WRITE_HARDENING;
    }
}

impl OpenVirtualDiskFlags {
    pub const NONE: Self = Self::empty();
}

/// Surface write-cache policy for an open virtual disk.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteCacheMode {
    /// Normal operation: only metadata is cached.
    #[default]
    CacheMetadata = cache_mode::CACHE_METADATA,
    WriteInternalMetadata = cache_mode::WRITE_INTERNAL_METADATA,
    WriteMetadata = cache_mode::WRITE_METADATA,
    CommitAll = cache_mode::COMMIT_ALL,
    /// Never flush to stable storage. Only for bulk-write windows.
    DisableFlushing = cache_mode::DISABLE_FLUSHING,
}

impl WriteCacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteCacheMode::CacheMetadata => "cache_metadata",
            WriteCacheMode::WriteInternalMetadata => "write_internal_metadata",
            WriteCacheMode::WriteMetadata => "write_metadata",
            WriteCacheMode::CommitAll => "commit_all",
            WriteCacheMode::DisableFlushing => "disable_flushing",
        }
    }
}

impl std::fmt::Display for WriteCacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u16> for WriteCacheMode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            cache_mode::CACHE_METADATA => Ok(WriteCacheMode::CacheMetadata),
            cache_mode::WRITE_INTERNAL_METADATA => Ok(WriteCacheMode::WriteInternalMetadata),
            cache_mode::WRITE_METADATA => Ok(WriteCacheMode::WriteMetadata),
            cache_mode::COMMIT_ALL => Ok(WriteCacheMode::CommitAll),
            cache_mode::DISABLE_FLUSHING => Ok(WriteCacheMode::DisableFlushing),
            other => Err(other),
        }
    }
}
