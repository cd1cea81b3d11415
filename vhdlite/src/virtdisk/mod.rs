//! Virtual disk (VHD/VHDX) lifecycle operations.
//!
//! This module talks to the host's virtual disk service:
//! - `DiskHandleService` - create, open, detach, write-cache policy
//! - `DiskHandle` - RAII wrapper for an open disk handle
//! - `abi` - fixed-layout parameter records sent to the native layer
//! - `VirtDiskApi` - native backend trait (Win32, or unsupported elsewhere)
//!
//! # Usage
//!
//! ```ignore
//! let service = DiskHandleService::new();
//! service.create_disk(Path::new("C:\\layers\\scratch.vhdx"), 20, 1)?;
//!
//! // Bulk writes without flushing, then back to normal caching.
//! service.with_write_cache_bypassed(path, |_handle| unpack_layer(path))?;
//! ```

pub mod abi;
mod error;
mod flags;
mod handle;
mod options;
pub mod platform;
mod service;

pub use error::{NativeError, VirtDiskError};
pub use flags::{CreateVirtualDiskFlags, OpenVirtualDiskFlags, VirtualDiskAccess, WriteCacheMode};
pub use handle::{DiskHandle, RawDiskHandle};
pub use options::{CreateDiskOptions, DiskFormat, OpenDiskOptions, gb_to_bytes, mb_to_block_bytes};
pub use platform::{BackendError, NativeResult, UnsupportedVirtDisk, VirtDiskApi};
pub use service::DiskHandleService;
