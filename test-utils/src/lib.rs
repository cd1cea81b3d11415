//! Test helpers for VhdLite.
//!
//! [`FakeVirtDisk`] stands in for the host's virtual disk service. It keeps
//! per-path disk state, counts live handles, logs every call and can be told
//! to fail the next call of a given kind.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use vhdlite::virtdisk::abi::{
    CreateVirtualDiskParameters, OpenVirtualDiskParameters, StorageSetSurfaceCachePolicyRequest,
    VirtualStorageType, read_wide_ptr,
};
use vhdlite::virtdisk::{
    BackendError, CreateVirtualDiskFlags, NativeError, NativeResult, OpenVirtualDiskFlags,
    RawDiskHandle, VirtDiskApi, VirtualDiskAccess, WriteCacheMode,
};
use vhdlite_shared::constants::{ioctl, versions};

/// `ERROR_INVALID_FUNCTION`
pub const INVALID_FUNCTION: NativeError = NativeError::new(1);

/// Native operation kinds, used for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Open,
    Detach,
    IoControl,
    Close,
}

/// One recorded native call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Create {
        path: PathBuf,
        storage_type: VirtualStorageType,
        access: VirtualDiskAccess,
        flags: CreateVirtualDiskFlags,
        version: u32,
        max_size_bytes: u64,
        block_size_bytes: u32,
        parent_path: Option<String>,
        source_path: Option<String>,
    },
    Open {
        path: PathBuf,
        access: VirtualDiskAccess,
        flags: OpenVirtualDiskFlags,
        /// `None` when no parameter block was sent.
        version: Option<u32>,
        get_info_only: bool,
        read_only: bool,
    },
    Detach {
        handle: RawDiskHandle,
        flags: u32,
    },
    IoControl {
        handle: RawDiskHandle,
        control_code: u32,
        request_level: Option<u32>,
        cache_mode: Option<u16>,
    },
    Close {
        handle: RawDiskHandle,
    },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::Create { .. } => Op::Create,
            Call::Open { .. } => Op::Open,
            Call::Detach { .. } => Op::Detach,
            Call::IoControl { .. } => Op::IoControl,
            Call::Close { .. } => Op::Close,
        }
    }
}

/// Disk image as seen by the fake service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeDisk {
    pub max_size_bytes: u64,
    pub block_size_bytes: u32,
    pub parent_path: Option<String>,
    pub attached: bool,
    pub cache_mode: WriteCacheMode,
}

impl Default for FakeDisk {
    fn default() -> Self {
        Self {
            max_size_bytes: 0,
            block_size_bytes: 0,
            parent_path: None,
            attached: false,
            cache_mode: WriteCacheMode::CacheMetadata,
        }
    }
}

#[derive(Default)]
struct State {
    next_handle: usize,
    disks: HashMap<PathBuf, FakeDisk>,
    open: HashMap<RawDiskHandle, PathBuf>,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<NativeError>>,
    opened: usize,
    closed: usize,
}

impl State {
    fn take_failure(&mut self, op: Op) -> Option<NativeError> {
        self.failures.get_mut(&op).and_then(|queue| queue.pop_front())
    }

    fn allocate(&mut self, path: &Path) -> RawDiskHandle {
        self.next_handle += 4;
        let handle = RawDiskHandle::new(0x1000 + self.next_handle);
        self.open.insert(handle, path.to_path_buf());
        self.opened += 1;
        handle
    }

    fn disk_for(&mut self, handle: RawDiskHandle) -> Result<&mut FakeDisk, NativeError> {
        let path = self
            .open
            .get(&handle)
            .ok_or(NativeError::INVALID_HANDLE)?
            .clone();
        self.disks.get_mut(&path).ok_or(NativeError::FILE_NOT_FOUND)
    }
}

/// In-memory virtual disk service.
#[derive(Default)]
pub struct FakeVirtDisk {
    state: Mutex<State>,
}

impl FakeVirtDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake ready to hand to `DiskHandleService::with_backend`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed an existing, attached disk image.
    pub fn add_disk(&self, path: impl Into<PathBuf>) {
        self.state.lock().disks.insert(
            path.into(),
            FakeDisk {
                attached: true,
                ..Default::default()
            },
        );
    }

    /// Fail the next call of kind `op` with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: Op, err: NativeError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn disk(&self, path: impl AsRef<Path>) -> Option<FakeDisk> {
        self.state.lock().disks.get(path.as_ref()).cloned()
    }

    pub fn cache_mode(&self, path: impl AsRef<Path>) -> Option<WriteCacheMode> {
        self.disk(path).map(|d| d.cache_mode)
    }

    /// Handles opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.state.lock().open.len()
    }

    pub fn opened_count(&self) -> usize {
        self.state.lock().opened
    }

    pub fn closed_count(&self) -> usize {
        self.state.lock().closed
    }

    pub fn is_open(&self, handle: RawDiskHandle) -> bool {
        self.state.lock().open.contains_key(&handle)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().calls.iter().map(Call::op).collect()
    }
}

impl VirtDiskApi for FakeVirtDisk {
    fn create_virtual_disk(
        &self,
        storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: CreateVirtualDiskFlags,
        parameters: &CreateVirtualDiskParameters<'_>,
    ) -> NativeResult<RawDiskHandle> {
        let v2 = &parameters.version2;
        // SAFETY: the service keeps the path buffers alive for this call.
        let parent_path = unsafe { read_wide_ptr(v2.parent_path) };
        let source_path = unsafe { read_wide_ptr(v2.source_path) };

        let mut state = self.state.lock();
        state.calls.push(Call::Create {
            path: path.to_path_buf(),
            storage_type: *storage_type,
            access,
            flags,
            version: parameters.version(),
            max_size_bytes: v2.maximum_size,
            block_size_bytes: v2.block_size_in_bytes,
            parent_path: parent_path.clone(),
            source_path: source_path.clone(),
        });

        if let Some(err) = state.take_failure(Op::Create) {
            return Err(err.into());
        }
        if parameters.version() != versions::CREATE_VIRTUAL_DISK_VERSION_2 || !access.is_empty() {
            return Err(NativeError::INVALID_PARAMETER.into());
        }
        if state.disks.contains_key(path) {
            return Err(NativeError::FILE_EXISTS.into());
        }
        for dependency in parent_path.iter().chain(source_path.iter()) {
            if !state.disks.contains_key(Path::new(dependency)) {
                return Err(NativeError::FILE_NOT_FOUND.into());
            }
        }

        let max_size_bytes = match (&parent_path, v2.maximum_size) {
            (Some(parent), 0) => state.disks[Path::new(parent)].max_size_bytes,
            (_, size) => size,
        };
        state.disks.insert(
            path.to_path_buf(),
            FakeDisk {
                max_size_bytes,
                block_size_bytes: v2.block_size_in_bytes,
                parent_path,
                ..Default::default()
            },
        );
        Ok(state.allocate(path))
    }

    fn open_virtual_disk(
        &self,
        _storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: OpenVirtualDiskFlags,
        parameters: Option<&OpenVirtualDiskParameters>,
    ) -> NativeResult<RawDiskHandle> {
        let mut state = self.state.lock();
        state.calls.push(Call::Open {
            path: path.to_path_buf(),
            access,
            flags,
            version: parameters.map(|p| p.version()),
            get_info_only: parameters.is_some_and(|p| p.version2.get_info_only != 0),
            read_only: parameters.is_some_and(|p| p.version2.read_only != 0),
        });

        if let Some(err) = state.take_failure(Op::Open) {
            return Err(err.into());
        }
        if let Some(parameters) = parameters {
            if parameters.version() != versions::OPEN_VIRTUAL_DISK_VERSION_2 || !access.is_empty() {
                return Err(NativeError::INVALID_PARAMETER.into());
            }
        }
        if !state.disks.contains_key(path) {
            return Err(NativeError::FILE_NOT_FOUND.into());
        }

        Ok(state.allocate(path))
    }

    fn detach_virtual_disk(&self, handle: RawDiskHandle, flags: u32) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Detach { handle, flags });

        if let Some(err) = state.take_failure(Op::Detach) {
            return Err(err.into());
        }
        state.disk_for(handle)?.attached = false;
        Ok(())
    }

    fn device_io_control(
        &self,
        handle: RawDiskHandle,
        control_code: u32,
        input: &[u8],
    ) -> NativeResult<()> {
        let request = StorageSetSurfaceCachePolicyRequest::from_bytes(input);

        let mut state = self.state.lock();
        state.calls.push(Call::IoControl {
            handle,
            control_code,
            request_level: request.map(|r| r.request_level),
            cache_mode: request.map(|r| r.cache_mode),
        });

        if let Some(err) = state.take_failure(Op::IoControl) {
            return Err(err.into());
        }
        if control_code != ioctl::STORAGE_SET_SURFACE_CACHE_POLICY {
            return Err(INVALID_FUNCTION.into());
        }
        let mode = request
            .filter(|r| r.request_level == ioctl::SURFACE_CACHE_POLICY_REQUEST_LEVEL)
            .and_then(|r| r.mode())
            .ok_or(BackendError::Native(NativeError::INVALID_PARAMETER))?;

        state.disk_for(handle)?.cache_mode = mode;
        Ok(())
    }

    /// The handle is consumed even when a failure is injected.
    fn close_handle(&self, handle: RawDiskHandle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Close { handle });

        if state.open.remove(&handle).is_none() {
            return Err(NativeError::INVALID_HANDLE.into());
        }
        state.closed += 1;

        if let Some(err) = state.take_failure(Op::Close) {
            return Err(err.into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Fake"
    }
}
