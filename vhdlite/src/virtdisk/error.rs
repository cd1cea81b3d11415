//! Error types for the virtual disk layer.
//!
//! - [`NativeError`]: a raw failure code reported by the host service
//! - [`VirtDiskError`]: what a virtual disk operation failed at
//!
//! Native codes are carried verbatim; nothing here retries or reinterprets
//! them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use vhdlite_shared::errors::VhdliteError;

/// Failure code returned by a native call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub struct NativeError {
    code: u32,
}

impl NativeError {
    /// `ERROR_FILE_NOT_FOUND`
    pub const FILE_NOT_FOUND: NativeError = NativeError::new(2);
    /// `ERROR_ACCESS_DENIED`
    pub const ACCESS_DENIED: NativeError = NativeError::new(5);
    /// `ERROR_INVALID_HANDLE`
    pub const INVALID_HANDLE: NativeError = NativeError::new(6);
    /// `ERROR_NOT_SUPPORTED`
    pub const NOT_SUPPORTED: NativeError = NativeError::new(50);
    /// `ERROR_FILE_EXISTS`
    pub const FILE_EXISTS: NativeError = NativeError::new(80);
    /// `ERROR_INVALID_PARAMETER`
    pub const INVALID_PARAMETER: NativeError = NativeError::new(87);

    pub const fn new(code: u32) -> Self {
        Self { code }
    }

    pub fn code(&self) -> u32 {
        self.code
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = std::io::Error::from_raw_os_error(self.code as i32);
        write!(f, "code {:#x}: {}", self.code, os)
    }
}

impl From<NativeError> for std::io::Error {
    fn from(err: NativeError) -> Self {
        std::io::Error::from_raw_os_error(err.code as i32)
    }
}

/// Errors from virtual disk operations.
#[derive(Debug, Error)]
pub enum VirtDiskError {
    /// A native lifecycle or control call failed.
    #[error("{op} {}: {source}", path.display())]
    Native {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: NativeError,
    },

    /// Releasing a handle failed.
    #[error("close handle: {0}")]
    Close(#[source] NativeError),

    /// Rejected before reaching the native layer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The host has no virtual disk service.
    #[error("virtual disks not supported on this platform")]
    UnsupportedPlatform,
}

impl VirtDiskError {
    pub fn native(op: &'static str, path: impl Into<PathBuf>, source: NativeError) -> Self {
        Self::Native {
            op,
            path: path.into(),
            source,
        }
    }

    /// The native code behind this error, if there is one.
    pub fn native_code(&self) -> Option<u32> {
        match self {
            VirtDiskError::Native { source, .. } | VirtDiskError::Close(source) => {
                Some(source.code())
            }
            _ => None,
        }
    }
}

impl From<VirtDiskError> for VhdliteError {
    fn from(err: VirtDiskError) -> Self {
        match err {
            VirtDiskError::Native { .. } | VirtDiskError::Close(_) => {
                VhdliteError::Storage(err.to_string())
            }
            VirtDiskError::InvalidArgument(msg) => VhdliteError::InvalidArgument(msg),
            VirtDiskError::UnsupportedPlatform => VhdliteError::Unsupported(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_display_carries_code() {
        let err = VirtDiskError::native("open", "missing.vhdx", NativeError::FILE_NOT_FOUND);
        let msg = err.to_string();
        assert!(msg.starts_with("open missing.vhdx: code 0x2"), "{msg}");
        assert_eq!(err.native_code(), Some(2));
    }

    #[test]
    fn test_conversion_to_crate_error() {
        let err: VhdliteError =
            VirtDiskError::native("detach", "d.vhdx", NativeError::ACCESS_DENIED).into();
        assert!(matches!(err, VhdliteError::Storage(_)));

        let err: VhdliteError = VirtDiskError::UnsupportedPlatform.into();
        assert!(matches!(err, VhdliteError::Unsupported(_)));
        assert!(err.to_string().contains("not supported"));

        let err: VhdliteError = VirtDiskError::InvalidArgument("empty path".into()).into();
        assert!(matches!(err, VhdliteError::InvalidArgument(msg) if msg == "empty path"));
    }

    #[test]
    fn test_native_code_absent_for_local_errors() {
        assert_eq!(VirtDiskError::UnsupportedPlatform.native_code(), None);
        assert_eq!(
            VirtDiskError::Close(NativeError::INVALID_HANDLE).native_code(),
            Some(6)
        );
    }

    #[test]
    fn test_native_into_io_error() {
        let io: std::io::Error = NativeError::ACCESS_DENIED.into();
        assert_eq!(io.raw_os_error(), Some(5));
    }
}
