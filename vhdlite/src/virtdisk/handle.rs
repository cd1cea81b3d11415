//! Ownership of open virtual disk handles.
//!
//! A [`DiskHandle`] is released exactly once: either explicitly through
//! [`DiskHandle::close`], or by `Drop` if the owner never closed it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::VirtDiskError;
use super::platform::{BackendError, VirtDiskApi};

/// Native handle value. Carries no ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawDiskHandle(usize);

impl RawDiskHandle {
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RawDiskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// RAII-managed open virtual disk.
///
/// Not `Clone`: exactly one owner may release the handle. Callers that
/// share a handle across threads must serialize operations on it.
pub struct DiskHandle {
    api: Arc<dyn VirtDiskApi>,
    raw: RawDiskHandle,
    path: PathBuf,
    /// Cleared once the handle has been released or given away.
    owned: bool,
}

impl DiskHandle {
    pub(crate) fn new(api: Arc<dyn VirtDiskApi>, raw: RawDiskHandle, path: PathBuf) -> Self {
        Self {
            api,
            raw,
            path,
            owned: true,
        }
    }

    /// Take ownership of a raw handle obtained elsewhere.
    ///
    /// # Safety
    ///
    /// `raw` must be an open handle produced by `api`, and no other owner may
    /// release it afterwards.
    pub unsafe fn from_raw(
        api: Arc<dyn VirtDiskApi>,
        raw: RawDiskHandle,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(api, raw, path.into())
    }

    /// The underlying native handle. Valid while `self` is alive.
    pub fn as_raw(&self) -> RawDiskHandle {
        self.raw
    }

    /// Image path this handle was opened for.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn api(&self) -> &dyn VirtDiskApi {
        self.api.as_ref()
    }

    /// Release the handle and report whether the native close succeeded.
    pub fn close(mut self) -> Result<(), VirtDiskError> {
        self.owned = false;
        tracing::debug!(
            "Closing virtual disk handle {} ({})",
            self.raw,
            self.path.display()
        );
        self.api.close_handle(self.raw).map_err(|e| match e {
            BackendError::Native(err) => VirtDiskError::Close(err),
            BackendError::Unsupported => VirtDiskError::UnsupportedPlatform,
        })
    }

    /// Give up ownership without releasing. The caller becomes responsible
    /// for closing the returned handle.
    pub fn into_raw(mut self) -> RawDiskHandle {
        self.owned = false;
        self.raw
    }
}

impl fmt::Debug for DiskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskHandle")
            .field("raw", &self.raw)
            .field("path", &self.path)
            .field("backend", &self.api.name())
            .finish()
    }
}

impl Drop for DiskHandle {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }

        if let Err(e) = self.api.close_handle(self.raw) {
            tracing::warn!(
                "Failed to close virtual disk handle {} ({}): {:?}",
                self.raw,
                self.path.display(),
                e
            );
        } else {
            tracing::debug!(
                "Closed virtual disk handle {} ({})",
                self.raw,
                self.path.display()
            );
        }
    }
}
