//! Virtual disk lifecycle and write-cache control.
//!
//! [`DiskHandleService`] turns create / open / detach / cache-policy intents
//! into native calls. It holds no state besides the backend; every
//! operation is a synchronous call that either succeeds or returns the
//! native failure untouched.

use std::path::Path;
use std::sync::Arc;

use vhdlite_shared::constants::{detach_flags, ioctl};
use vhdlite_shared::errors::VhdliteResult;

use super::abi::{
    CreateVirtualDiskParameters, Guid, OpenVirtualDiskParameters,
    StorageSetSurfaceCachePolicyRequest, WideString,
};
use super::error::VirtDiskError;
use super::flags::{VirtualDiskAccess, WriteCacheMode};
use super::handle::DiskHandle;
use super::options::{CreateDiskOptions, OpenDiskOptions};
use super::platform::{self, VirtDiskApi};

/// Issues virtual disk lifecycle and policy commands against a backend.
#[derive(Clone)]
pub struct DiskHandleService {
    api: Arc<dyn VirtDiskApi>,
}

impl Default for DiskHandleService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiskHandleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskHandleService")
            .field("backend", &self.api.name())
            .finish()
    }
}

impl DiskHandleService {
    /// Service bound to this host's native backend.
    pub fn new() -> Self {
        Self::with_backend(platform::current())
    }

    /// Service bound to a specific backend.
    pub fn with_backend(api: Arc<dyn VirtDiskApi>) -> Self {
        Self { api }
    }

    pub fn backend_name(&self) -> &'static str {
        self.api.name()
    }

    pub fn is_available(&self) -> bool {
        self.api.is_available()
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create a dynamic disk image of `max_size_gb` GB with
    /// `block_size_mb` MB blocks, using the default storage type.
    ///
    /// The handle returned by the native create is released before this
    /// returns; creating does not attach the disk.
    pub fn create_disk(
        &self,
        path: &Path,
        max_size_gb: u32,
        block_size_mb: u32,
    ) -> VhdliteResult<()> {
        let options = CreateDiskOptions::sized(max_size_gb, block_size_mb)?;
        self.create_disk_with(path, &options)
    }

    /// Create a disk image from explicit options (differencing, clone,
    /// fixed allocation, pinned format).
    pub fn create_disk_with(&self, path: &Path, options: &CreateDiskOptions) -> VhdliteResult<()> {
        let handle = self.create_handle(path, options)?;
        handle.close()?;

        tracing::info!("Created virtual disk: {}", path.display());
        Ok(())
    }

    fn create_handle(
        &self,
        path: &Path,
        options: &CreateDiskOptions,
    ) -> Result<DiskHandle, VirtDiskError> {
        validate_path(path)?;
        options.validate()?;

        let parent = options.parent_path.as_deref().map(WideString::from_path);
        let source = options.source_path.as_deref().map(WideString::from_path);

        let mut parameters =
            CreateVirtualDiskParameters::new(options.max_size_bytes, options.block_size_bytes)
                .with_sector_size(options.sector_size_bytes)
                .with_unique_id(options.unique_id.map(Guid::from).unwrap_or_default())
                .with_resiliency_guid(options.resiliency_id.map(Guid::from).unwrap_or_default());
        if let Some(parent) = &parent {
            parameters = parameters.with_parent(parent);
        }
        if let Some(source) = &source {
            parameters = parameters.with_source(source);
        }

        tracing::debug!(
            "CreateVirtualDisk {} (max_size={} block_size={} format={} flags={:#x} parent={:?})",
            path.display(),
            options.max_size_bytes,
            options.block_size_bytes,
            options.format.as_str(),
            options.flags.bits(),
            options.parent_path
        );

        let raw = self
            .api
            .create_virtual_disk(
                &options.format.storage_type(),
                path,
                VirtualDiskAccess::NONE,
                options.flags,
                &parameters,
            )
            .map_err(|e| e.into_disk_error("create", path))?;

        Ok(DiskHandle::new(self.api.clone(), raw, path.to_path_buf()))
    }

    // ========================================================================
    // Open / Detach
    // ========================================================================

    /// Open an existing disk image. The caller owns the returned handle.
    pub fn open_disk(&self, path: &Path, options: &OpenDiskOptions) -> VhdliteResult<DiskHandle> {
        Ok(self.open_handle(path, options)?)
    }

    fn open_handle(
        &self,
        path: &Path,
        options: &OpenDiskOptions,
    ) -> Result<DiskHandle, VirtDiskError> {
        validate_path(path)?;
        options.validate()?;

        let parameters = options.send_parameters.then(|| {
            OpenVirtualDiskParameters::new(
                options.get_info_only,
                options.read_only,
                options.resiliency_id.map(Guid::from).unwrap_or_default(),
            )
        });

        tracing::debug!(
            "OpenVirtualDisk {} (access={:#x} flags={:#x} parameters={})",
            path.display(),
            options.access.bits(),
            options.flags.bits(),
            parameters.is_some()
        );

        let raw = self
            .api
            .open_virtual_disk(
                &options.format.storage_type(),
                path,
                options.access,
                options.flags,
                parameters.as_ref(),
            )
            .map_err(|e| e.into_disk_error("open", path))?;

        Ok(DiskHandle::new(self.api.clone(), raw, path.to_path_buf()))
    }

    /// Detach the disk image at `path` from the host.
    ///
    /// The handle opened for the detach is released whether or not the
    /// detach succeeds.
    pub fn detach_disk(&self, path: &Path) -> VhdliteResult<()> {
        let handle = self.open_handle(path, &OpenDiskOptions::detach())?;

        self.api
            .detach_virtual_disk(handle.as_raw(), detach_flags::NONE)
            .map_err(|e| e.into_disk_error("detach", path))?;

        tracing::info!("Detached virtual disk: {}", path.display());
        Ok(())
    }

    // ========================================================================
    // Write cache policy
    // ========================================================================

    /// Open `path` and switch its surface cache to
    /// [`WriteCacheMode::DisableFlushing`].
    ///
    /// Ownership of the returned handle moves to the caller, who must call
    /// [`restore_write_cache_metadata`](Self::restore_write_cache_metadata)
    /// once the bulk-write window is over and then release the handle. If
    /// the policy change fails the handle is released here and never
    /// returned.
    pub fn enable_write_cache_bypass(&self, path: &Path) -> VhdliteResult<DiskHandle> {
        let handle = self.open_handle(path, &OpenDiskOptions::cache_bypass())?;

        if let Err(e) = issue_cache_policy(&handle, WriteCacheMode::DisableFlushing) {
            if let Err(close_err) = handle.close() {
                tracing::warn!(
                    "Failed to release {} after cache policy error: {}",
                    path.display(),
                    close_err
                );
            }
            return Err(e.into());
        }

        tracing::info!("Write cache bypass enabled: {}", path.display());
        Ok(handle)
    }

    /// Put an open disk back into [`WriteCacheMode::CacheMetadata`].
    ///
    /// Never releases `handle`; its lifetime stays with the caller.
    pub fn restore_write_cache_metadata(&self, handle: &DiskHandle) -> VhdliteResult<()> {
        self.set_write_cache_mode(handle, WriteCacheMode::CacheMetadata)
    }

    /// Set an arbitrary surface cache mode on an open disk.
    pub fn set_write_cache_mode(&self, handle: &DiskHandle, mode: WriteCacheMode) -> VhdliteResult<()> {
        issue_cache_policy(handle, mode)?;
        tracing::debug!(
            "Write cache mode {} set on {}",
            mode,
            handle.path().display()
        );
        Ok(())
    }

    /// Run `f` with the disk's write cache bypassed.
    ///
    /// Cache metadata mode is restored and the handle released on every
    /// exit path. An error from `f` takes precedence over a restore error.
    pub fn with_write_cache_bypassed<T, F>(&self, path: &Path, f: F) -> VhdliteResult<T>
    where
        F: FnOnce(&DiskHandle) -> VhdliteResult<T>,
    {
        let handle = self.enable_write_cache_bypass(path)?;

        let result = f(&handle);
        let restored = self.restore_write_cache_metadata(&handle);
        let closed = handle.close();

        match (result, restored) {
            (Ok(value), Ok(())) => {
                closed?;
                Ok(value)
            }
            (Ok(_), Err(restore_err)) => {
                log_close_error(path, closed);
                Err(restore_err)
            }
            (Err(e), restored) => {
                if let Err(restore_err) = restored {
                    tracing::warn!(
                        "Failed to restore write cache on {}: {}",
                        path.display(),
                        restore_err
                    );
                }
                log_close_error(path, closed);
                Err(e)
            }
        }
    }
}

/// Send `IOCTL_STORAGE_SET_SURFACE_CACHE_POLICY` for `mode`.
fn issue_cache_policy(handle: &DiskHandle, mode: WriteCacheMode) -> Result<(), VirtDiskError> {
    let request = StorageSetSurfaceCachePolicyRequest::new(mode);
    handle
        .api()
        .device_io_control(
            handle.as_raw(),
            ioctl::STORAGE_SET_SURFACE_CACHE_POLICY,
            request.as_bytes(),
        )
        .map_err(|e| e.into_disk_error("set cache policy", handle.path()))
}

fn log_close_error(path: &Path, closed: Result<(), VirtDiskError>) {
    if let Err(e) = closed {
        tracing::warn!("Failed to release {}: {}", path.display(), e);
    }
}

fn validate_path(path: &Path) -> Result<(), VirtDiskError> {
    if path.as_os_str().is_empty() {
        return Err(VirtDiskError::InvalidArgument("empty disk path".into()));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(VirtDiskError::InvalidArgument(format!(
            "disk path contains NUL: {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtdisk::platform::UnsupportedVirtDisk;
    use vhdlite_shared::errors::VhdliteError;

    fn unsupported() -> DiskHandleService {
        DiskHandleService::with_backend(Arc::new(UnsupportedVirtDisk))
    }

    #[test]
    fn test_unsupported_platform_surfaces_as_unsupported() {
        let service = unsupported();
        assert!(!service.is_available());

        let err = service
            .create_disk(Path::new("test.vhdx"), 10, 1)
            .unwrap_err();
        assert!(matches!(err, VhdliteError::Unsupported(_)));

        let err = service.detach_disk(Path::new("test.vhdx")).unwrap_err();
        assert!(matches!(err, VhdliteError::Unsupported(_)));

        let err = service
            .enable_write_cache_bypass(Path::new("test.vhdx"))
            .unwrap_err();
        assert!(matches!(err, VhdliteError::Unsupported(_)));
    }

    #[test]
    fn test_empty_path_rejected_before_native_call() {
        let err = unsupported().detach_disk(Path::new("")).unwrap_err();
        assert!(matches!(err, VhdliteError::InvalidArgument(_)));
    }

    #[test]
    fn test_oversized_block_rejected() {
        let err = unsupported()
            .create_disk(Path::new("test.vhdx"), 10, 4096)
            .unwrap_err();
        assert!(matches!(err, VhdliteError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path(Path::new("C:\\disks\\a.vhdx")).is_ok());
        assert!(validate_path(Path::new("a\0b.vhdx")).is_err());
    }
}
