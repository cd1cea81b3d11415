//! Windows backend: `virtdisk.dll` plus `DeviceIoControl`.
//!
//! The three virtual disk entry points are declared here against our own
//! `#[repr(C)]` records. Handle release and device control go through the
//! `windows` crate. Overlapped I/O is never used; every call blocks.

use std::ffi::c_void;
use std::path::Path;
use std::ptr;

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::IO::DeviceIoControl;

use super::{BackendError, NativeResult, VirtDiskApi};
use crate::virtdisk::abi::{
    CreateVirtualDiskParameters, OpenVirtualDiskParameters, VirtualStorageType, WideString,
};
use crate::virtdisk::error::NativeError;
use crate::virtdisk::flags::{CreateVirtualDiskFlags, OpenVirtualDiskFlags, VirtualDiskAccess};
use crate::virtdisk::handle::RawDiskHandle;

const ERROR_SUCCESS: u32 = 0;

#[link(name = "virtdisk")]
unsafe extern "system" {
    fn CreateVirtualDisk(
        virtual_storage_type: *const VirtualStorageType,
        path: *const u16,
        virtual_disk_access_mask: u32,
        security_descriptor: *const c_void,
        flags: u32,
        provider_specific_flags: u32,
        parameters: *const CreateVirtualDiskParameters<'_>,
        overlapped: *const c_void,
        handle: *mut *mut c_void,
    ) -> u32;

    fn OpenVirtualDisk(
        virtual_storage_type: *const VirtualStorageType,
        path: *const u16,
        virtual_disk_access_mask: u32,
        flags: u32,
        parameters: *const OpenVirtualDiskParameters,
        handle: *mut *mut c_void,
    ) -> u32;

    fn DetachVirtualDisk(
        virtual_disk_handle: *mut c_void,
        flags: u32,
        provider_specific_flags: u32,
    ) -> u32;
}

/// Windows virtual disk service.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32VirtDisk;

fn check(result: u32) -> NativeResult<()> {
    if result == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(BackendError::Native(NativeError::new(result)))
    }
}

/// Recover the Win32 code from an `HRESULT_FROM_WIN32` value.
fn win32_code(err: &windows::core::Error) -> NativeError {
    let hr = err.code().0 as u32;
    if hr & 0xffff_0000 == 0x8007_0000 {
        NativeError::new(hr & 0xffff)
    } else {
        NativeError::new(hr)
    }
}

fn to_handle(raw: RawDiskHandle) -> HANDLE {
    HANDLE(raw.as_usize() as *mut c_void)
}

impl VirtDiskApi for Win32VirtDisk {
    fn create_virtual_disk(
        &self,
        storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: CreateVirtualDiskFlags,
        parameters: &CreateVirtualDiskParameters<'_>,
    ) -> NativeResult<RawDiskHandle> {
        let wide_path = WideString::from_path(path);
        let mut handle: *mut c_void = ptr::null_mut();

        // SAFETY: every pointer refers to a live, correctly laid out value
        // for the duration of the call; `parameters` borrows its path buffers.
        let result = unsafe {
            CreateVirtualDisk(
                storage_type,
                wide_path.as_ptr(),
                access.bits(),
                ptr::null(),
                flags.bits(),
                0,
                parameters,
                ptr::null(),
                &mut handle,
            )
        };
        check(result)?;

        Ok(RawDiskHandle::new(handle as usize))
    }

    fn open_virtual_disk(
        &self,
        storage_type: &VirtualStorageType,
        path: &Path,
        access: VirtualDiskAccess,
        flags: OpenVirtualDiskFlags,
        parameters: Option<&OpenVirtualDiskParameters>,
    ) -> NativeResult<RawDiskHandle> {
        let wide_path = WideString::from_path(path);
        let mut handle: *mut c_void = ptr::null_mut();
        let parameters = parameters.map_or(ptr::null(), |p| p as *const _);

        // SAFETY: see create_virtual_disk; a null parameter block is allowed.
        let result = unsafe {
            OpenVirtualDisk(
                storage_type,
                wide_path.as_ptr(),
                access.bits(),
                flags.bits(),
                parameters,
                &mut handle,
            )
        };
        check(result)?;

        Ok(RawDiskHandle::new(handle as usize))
    }

    fn detach_virtual_disk(&self, handle: RawDiskHandle, flags: u32) -> NativeResult<()> {
        // SAFETY: handle was produced by OpenVirtualDisk and is still owned.
        let result = unsafe { DetachVirtualDisk(to_handle(handle).0, flags, 0) };
        check(result)
    }

    fn device_io_control(
        &self,
        handle: RawDiskHandle,
        control_code: u32,
        input: &[u8],
    ) -> NativeResult<()> {
        let mut bytes_returned = 0u32;

        // SAFETY: input is a live byte slice; no output buffer, no overlapped.
        unsafe {
            DeviceIoControl(
                to_handle(handle),
                control_code,
                Some(input.as_ptr() as *const c_void),
                input.len() as u32,
                None,
                0,
                Some(&mut bytes_returned as *mut u32),
                None,
            )
        }
        .map_err(|e| BackendError::Native(win32_code(&e)))
    }

    fn close_handle(&self, handle: RawDiskHandle) -> NativeResult<()> {
        // SAFETY: the caller owns the handle and releases it exactly once.
        unsafe { CloseHandle(to_handle(handle)) }
            .map_err(|e| BackendError::Native(win32_code(&e)))
    }

    fn name(&self) -> &'static str {
        "Win32"
    }
}
