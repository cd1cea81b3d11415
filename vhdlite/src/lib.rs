//! VhdLite - virtual disk lifecycle for container storage
//!
//! Creates, opens and detaches VHD/VHDX images through the host's virtual
//! disk service, and toggles their surface write cache around bulk-write
//! phases such as layer extraction.
//!
//! On hosts without a virtual disk service every operation returns
//! [`VhdliteError::Unsupported`].

pub mod options;
pub mod virtdisk;

pub use options::VhdliteOptions;
pub use vhdlite_shared::constants;
pub use vhdlite_shared::errors::{VhdliteError, VhdliteResult};
pub use virtdisk::{
    CreateDiskOptions, DiskFormat, DiskHandle, DiskHandleService, OpenDiskOptions, WriteCacheMode,
};
