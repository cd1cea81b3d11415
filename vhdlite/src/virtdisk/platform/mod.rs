//! Native virtual disk backends.
//!
//! The host's virtual disk service is reached through the [`VirtDiskApi`]
//! trait so the service layer never touches `#[cfg]` itself.
//!
//! ```text
//! VirtDiskApi (trait)
//!     ├── Win32VirtDisk        → virtdisk.dll + DeviceIoControl (Windows)
//!     └── UnsupportedVirtDisk  → UnsupportedPlatform everywhere else
//! ```
//!
//! Every call is synchronous and blocks the calling thread until the
//! native layer returns. Implementations must be safe to use concurrently
//! on distinct handles; calls on the same handle are serialized by callers.

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use self::win32::Win32VirtDisk;

use std::path::Path;
use std::sync::Arc;

use super::abi::{CreateVirtualDiskParameters, OpenVirtualDiskParameters, VirtualStorageType};
use super::error::{NativeError, VirtDiskError};
use super::flags::{CreateVirtualDiskFlags, OpenVirtualDiskFlags, VirtualDiskAccess};
use super::handle::RawDiskHandle;

/// Result of a single native call.
pub type NativeResult<T> = Result<T, BackendError>;

/// Why a native call did not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The native layer reported a failure code.
    Native(NativeError),
    /// There is no native layer on this host.
    Unsupported,
}

impl From<NativeError> for BackendError {
    fn from(err: NativeError) -> Self {
        BackendError::Native(err)
    }
}

impl BackendError {
    /// Attach the operation name and path this call was made for.
    pub(crate) fn into_disk_error(self, op: &'static str, path: &Path) -> VirtDiskError {
        match self {
            BackendError::Native(err) => VirtDiskError::native(op, path, err),
            BackendError::Unsupported => VirtDiskError::UnsupportedPlatform,
        }
    }
}

/// The native virtual disk control protocol.
pub trait VirtDiskApi: Send + Sync {
    /// `CreateVirtualDisk`: create an image and return a handle to it.
    fn create_virtual_disk(
        &self,
        storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: CreateVirtualDiskFlags,
        parameters: &CreateVirtualDiskParameters<'_>,
    ) -> NativeResult<RawDiskHandle>;

    /// `OpenVirtualDisk`: open an existing image.
    ///
    /// `parameters` is `None` when the caller sends no parameter block.
    fn open_virtual_disk(
        &self,
        storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: OpenVirtualDiskFlags,
        parameters: Option<&OpenVirtualDiskParameters>,
    ) -> NativeResult<RawDiskHandle>;

    /// `DetachVirtualDisk`
    fn detach_virtual_disk(&self, handle: RawDiskHandle, flags: u32) -> NativeResult<()>;

    /// `DeviceIoControl` with an input buffer and no output buffer.
    fn device_io_control(
        &self,
        handle: RawDiskHandle,
        control_code: u32,
        input: &[u8],
    ) -> NativeResult<()>;

    /// `CloseHandle`
    fn close_handle(&self, handle: RawDiskHandle) -> NativeResult<()>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Whether this backend can reach a native service at all.
    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// Current Platform
// ============================================================================

/// Get the current platform's backend.
#[cfg(windows)]
pub fn current() -> Arc<dyn VirtDiskApi> {
    Arc::new(Win32VirtDisk)
}

#[cfg(not(windows))]
pub fn current() -> Arc<dyn VirtDiskApi> {
    Arc::new(UnsupportedVirtDisk)
}

/// Fallback for hosts without a virtual disk service.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVirtDisk;

impl VirtDiskApi for UnsupportedVirtDisk {
    fn create_virtual_disk(
        &self,
        _storage_type: &VirtualStorageType,
        _path: &Path,
        _access: VirtualDiskAccess,
        _flags: CreateVirtualDiskFlags,
        _parameters: &CreateVirtualDiskParameters<'_>,
    ) -> NativeResult<RawDiskHandle> {
        Err(BackendError::Unsupported)
    }

    fn open_virtual_disk(
        &self,
        _storage_type: &VirtualStorageType,
        _path: &Path,
        _access: VirtualDiskAccess,
        _flags: OpenVirtualDiskFlags,
        _parameters: Option<&OpenVirtualDiskParameters>,
    ) -> NativeResult<RawDiskHandle> {
        Err(BackendError::Unsupported)
    }

    fn detach_virtual_disk(&self, _handle: RawDiskHandle, _flags: u32) -> NativeResult<()> {
        Err(BackendError::Unsupported)
    }

    fn device_io_control(
        &self,
        _handle: RawDiskHandle,
        _control_code: u32,
        _input: &[u8],
    ) -> NativeResult<()> {
        Err(BackendError::Unsupported)
    }

    fn close_handle(&self, _handle: RawDiskHandle) -> NativeResult<()> {
        Err(BackendError::Unsupported)
    }

    fn name(&self) -> &'static str {
        "Unsupported"
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_rejects_everything() {
        let api = UnsupportedVirtDisk;
        let params = CreateVirtualDiskParameters::new(0, 0);
        let path = Path::new("disk.vhdx");

        assert!(!api.is_available());
        assert_eq!(
            api.create_virtual_disk(
                &VirtualStorageType::DEFAULT,
                path,
                VirtualDiskAccess::NONE,
                CreateVirtualDiskFlags::NONE,
                &params,
            ),
            Err(BackendError::Unsupported)
        );
        assert_eq!(
            api.close_handle(RawDiskHandle::new(1)),
            Err(BackendError::Unsupported)
        );
    }

    #[test]
    #[cfg(not(windows))]
    fn test_current_is_unsupported_off_windows() {
        assert_eq!(current().name(), "Unsupported");
    }

    #[test]
    fn test_backend_error_context() {
        let err = BackendError::from(NativeError::FILE_NOT_FOUND)
            .into_disk_error("open", Path::new("x.vhdx"));
        assert_eq!(err.native_code(), Some(2));

        let err = BackendError::Unsupported.into_disk_error("open", Path::new("x.vhdx"));
        assert!(matches!(err, VirtDiskError::UnsupportedPlatform));
    }
}
