//! Native virtual disk protocol constants.
//!
//! These values are defined by the host's virtual disk service and must be
//! sent bit-for-bit. Typed wrappers live in `vhdlite::virtdisk`; this module
//! is the single place the raw numbers are written down.

/// Version tag stamped into every parameter block we send.
pub mod versions {
    /// `CREATE_VIRTUAL_DISK_VERSION_2`
    pub const CREATE_VIRTUAL_DISK_VERSION_2: u32 = 2;

    /// `OPEN_VIRTUAL_DISK_VERSION_2`
    pub const OPEN_VIRTUAL_DISK_VERSION_2: u32 = 2;
}

/// `VIRTUAL_DISK_ACCESS_MASK` bits (combinable).
pub mod access {
    pub const NONE: u32 = 0x0000_0000;
    pub const ATTACH_RO: u32 = 0x0001_0000;
    pub const ATTACH_RW: u32 = 0x0002_0000;
    pub const DETACH: u32 = 0x0004_0000;
    pub const GET_INFO: u32 = 0x0008_0000;
    pub const CREATE: u32 = 0x0010_0000;
    pub const METAOPS: u32 = 0x0020_0000;
    /// ATTACH_RO | DETACH | GET_INFO
    pub const READ: u32 = 0x000d_0000;
    /// Every access bit.
    pub const ALL: u32 = 0x003f_0000;
    /// ATTACH_RW | CREATE | METAOPS
    pub const WRITABLE: u32 = 0x0032_0000;
}

/// `CREATE_VIRTUAL_DISK_FLAG` bits.
pub mod create_flags {
    pub const NONE: u32 = 0x0;
    pub const FULL_PHYSICAL_ALLOCATION: u32 = 0x1;
    pub const PREVENT_WRITES_TO_SOURCE_DISK: u32 = 0x2;
    pub const DO_NOT_COPY_METADATA_FROM_PARENT: u32 = 0x4;
}

/// `OPEN_VIRTUAL_DISK_FLAG` bits.
pub mod open_flags {
    pub const NONE: u32 = 0x0;
    pub const NO_PARENTS: u32 = 0x1;
    pub const BLANK_FILE: u32 = 0x2;
    pub const BOOT_DRIVE: u32 = 0x4;
    pub const CACHED_IO: u32 = 0x8;
    pub const CUSTOM_DIFF_CHAIN: u32 = 0x10;
    pub const PARENT_CACHED_IO: u32 = 0x20;
    pub const VHDSET_FILE_ONLY: u32 = 0x40;
    pub const IGNORE_RELATIVE_PARENT_LOCATOR: u32 = 0x80;
    pub const NO_WRITE_HARDENING: u32 = 0x100;
}

/// `DETACH_VIRTUAL_DISK_FLAG` values.
pub mod detach_flags {
    pub const NONE: u32 = 0x0;
}

/// Surface write-cache modes (ordinal, not bit flags).
pub mod cache_mode {
    pub const CACHE_METADATA: u16 = 0;
    pub const WRITE_INTERNAL_METADATA: u16 = 1;
    pub const WRITE_METADATA: u16 = 2;
    pub const COMMIT_ALL: u16 = 3;
    pub const DISABLE_FLUSHING: u16 = 4;
}

/// Device control addressing for the surface cache policy request.
pub mod ioctl {
    /// `IOCTL_STORAGE_SET_SURFACE_CACHE_POLICY`
    pub const STORAGE_SET_SURFACE_CACHE_POLICY: u32 = 0x002d_1a10;

    /// Request level understood by the policy request.
    pub const SURFACE_CACHE_POLICY_REQUEST_LEVEL: u32 = 1;
}

/// `VIRTUAL_STORAGE_TYPE_DEVICE_*` identifiers.
pub mod storage_type {
    /// Let the service infer the format from the file extension.
    pub const DEVICE_UNKNOWN: u32 = 0;
    pub const DEVICE_ISO: u32 = 1;
    pub const DEVICE_VHD: u32 = 2;
    pub const DEVICE_VHDX: u32 = 3;
    pub const DEVICE_VHDSET: u32 = 4;
}

/// Size units used when converting caller-facing sizes to bytes.
pub mod units {
    pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;
    pub const BYTES_PER_MB: u64 = 1024 * 1024;
}

/// Disk creation defaults.
pub mod defaults {
    /// Default maximum disk size in GB (sparse, grows as needed)
    pub const DEFAULT_DISK_SIZE_GB: u32 = 10;

    /// Default block allocation size in MB
    pub const DEFAULT_BLOCK_SIZE_MB: u32 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_composites() {
        assert_eq!(access::READ, access::ATTACH_RO | access::DETACH | access::GET_INFO);
        assert_eq!(access::WRITABLE, access::ATTACH_RW | access::CREATE | access::METAOPS);
        assert_eq!(
            access::ALL,
            access::ATTACH_RO
                | access::ATTACH_RW
                | access::DETACH
                | access::GET_INFO
                | access::CREATE
                | access::METAOPS
        );
    }

    #[test]
    fn test_documented_decimal_values() {
        assert_eq!(access::ATTACH_RO, 65536);
        assert_eq!(access::DETACH, 262144);
        assert_eq!(access::READ, 851968);
        assert_eq!(access::ALL, 4128768);
        assert_eq!(access::WRITABLE, 3276800);
        assert_eq!(ioctl::STORAGE_SET_SURFACE_CACHE_POLICY, 0x2d1a10);
    }
}
