//! Integration tests for disk create / open / detach.
//!
//! Every test runs against `FakeVirtDisk`, which records the native calls
//! and counts handles so leaks show up as a non-zero `live_handles()`.

use std::path::Path;
use std::sync::Arc;

use vhdlite::virtdisk::abi::VirtualStorageType;
use vhdlite::virtdisk::{
    CreateDiskOptions, CreateVirtualDiskFlags, DiskFormat, NativeError, OpenDiskOptions,
    OpenVirtualDiskFlags, VirtualDiskAccess,
};
use vhdlite::{DiskHandleService, VhdliteError};
use vhdlite_test_utils::{Call, FakeVirtDisk, Op};

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct TestContext {
    fake: Arc<FakeVirtDisk>,
    service: DiskHandleService,
}

impl TestContext {
    fn new() -> Self {
        let fake = FakeVirtDisk::shared();
        let service = DiskHandleService::with_backend(fake.clone());
        Self { fake, service }
    }
}

// ============================================================================
// CREATE
// ============================================================================

#[test]
fn create_disk_sends_version2_block_with_byte_sizes() {
    let ctx = TestContext::new();

    ctx.service
        .create_disk(Path::new("test.vhdx"), 10, 1)
        .expect("create should succeed");

    let calls = ctx.fake.calls();
    assert_eq!(calls.len(), 2, "create then close: {calls:?}");
    match &calls[0] {
        Call::Create {
            path,
            storage_type,
            access,
            flags,
            version,
            max_size_bytes,
            block_size_bytes,
            parent_path,
            source_path,
        } => {
            assert_eq!(path, Path::new("test.vhdx"));
            assert_eq!(*storage_type, VirtualStorageType::DEFAULT);
            assert_eq!(*access, VirtualDiskAccess::NONE);
            assert_eq!(*flags, CreateVirtualDiskFlags::NONE);
            assert_eq!(*version, 2);
            assert_eq!(*max_size_bytes, 10_737_418_240);
            assert_eq!(*block_size_bytes, 1_048_576);
            assert_eq!(*parent_path, None);
            assert_eq!(*source_path, None);
        }
        other => panic!("expected create, got {other:?}"),
    }
    assert!(matches!(calls[1], Call::Close { .. }));

    assert_eq!(ctx.fake.opened_count(), 1);
    assert_eq!(ctx.fake.closed_count(), 1);
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn create_disk_native_failure_is_returned_without_handle() {
    let ctx = TestContext::new();
    ctx.fake.fail_next(Op::Create, NativeError::ACCESS_DENIED);

    let err = ctx
        .service
        .create_disk(Path::new("denied.vhdx"), 1, 1)
        .unwrap_err();

    assert!(matches!(&err, VhdliteError::Storage(msg) if msg.contains("code 0x5")));
    assert_eq!(ctx.fake.ops(), vec![Op::Create]);
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn create_disk_close_failure_is_reported() {
    let ctx = TestContext::new();
    ctx.fake.fail_next(Op::Close, NativeError::INVALID_HANDLE);

    let err = ctx
        .service
        .create_disk(Path::new("test.vhdx"), 1, 1)
        .unwrap_err();

    assert!(matches!(err, VhdliteError::Storage(_)));
    assert_eq!(ctx.fake.closed_count(), 1);
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn create_existing_disk_fails() {
    let ctx = TestContext::new();
    ctx.fake.add_disk("exists.vhdx");

    let err = ctx
        .service
        .create_disk(Path::new("exists.vhdx"), 1, 1)
        .unwrap_err();
    assert!(matches!(err, VhdliteError::Storage(msg) if msg.contains("create exists.vhdx")));
}

#[test]
fn create_differencing_disk_passes_parent_and_inherits_size() {
    let ctx = TestContext::new();
    ctx.service
        .create_disk(Path::new("base.vhdx"), 20, 1)
        .unwrap();

    let options = CreateDiskOptions::differencing("base.vhdx").with_format(DiskFormat::Vhdx);
    ctx.service
        .create_disk_with(Path::new("child.vhdx"), &options)
        .unwrap();

    let child = ctx.fake.disk("child.vhdx").expect("child disk created");
    assert_eq!(child.parent_path.as_deref(), Some("base.vhdx"));
    assert_eq!(child.max_size_bytes, 20 * 1024 * 1024 * 1024);

    let create = ctx
        .fake
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Create { .. }))
        .nth(1)
        .unwrap();
    match create {
        Call::Create {
            storage_type,
            max_size_bytes,
            ..
        } => {
            assert_eq!(storage_type, VirtualStorageType::VHDX);
            assert_eq!(max_size_bytes, 0);
        }
        _ => unreachable!(),
    }
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn create_differencing_disk_with_missing_parent_fails() {
    let ctx = TestContext::new();
    let options = CreateDiskOptions::differencing("gone.vhdx");

    let err = ctx
        .service
        .create_disk_with(Path::new("child.vhdx"), &options)
        .unwrap_err();

    assert!(matches!(err, VhdliteError::Storage(_)));
    assert!(ctx.fake.disk("child.vhdx").is_none());
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn create_with_zero_size_and_no_parent_is_rejected_locally() {
    let ctx = TestContext::new();

    let err = ctx
        .service
        .create_disk(Path::new("empty.vhdx"), 0, 1)
        .unwrap_err();

    assert!(matches!(err, VhdliteError::InvalidArgument(_)));
    assert!(ctx.fake.calls().is_empty());
}

// ============================================================================
// DETACH
// ============================================================================

#[test]
fn detach_disk_opens_with_detach_access_and_releases() {
    let ctx = TestContext::new();
    ctx.fake.add_disk("attached.vhdx");

    ctx.service
        .detach_disk(Path::new("attached.vhdx"))
        .expect("detach should succeed");

    let calls = ctx.fake.calls();
    assert_eq!(ctx.fake.ops(), vec![Op::Open, Op::Detach, Op::Close]);
    match &calls[0] {
        Call::Open {
            access,
            flags,
            version,
            ..
        } => {
            assert_eq!(*access, VirtualDiskAccess::DETACH);
            assert_eq!(*flags, OpenVirtualDiskFlags::NONE);
            assert_eq!(*version, None);
        }
        other => panic!("expected open, got {other:?}"),
    }
    assert!(matches!(calls[1], Call::Detach { flags: 0, .. }));

    assert!(!ctx.fake.disk("attached.vhdx").unwrap().attached);
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn detach_missing_disk_returns_open_error_without_detach_or_release() {
    let ctx = TestContext::new();

    let err = ctx
        .service
        .detach_disk(Path::new("missing.vhdx"))
        .unwrap_err();

    assert!(matches!(&err, VhdliteError::Storage(msg) if msg.contains("open missing.vhdx")));
    assert_eq!(ctx.fake.ops(), vec![Op::Open]);
    assert_eq!(ctx.fake.opened_count(), 0);
    assert_eq!(ctx.fake.closed_count(), 0);
}

#[test]
fn detach_failure_still_releases_handle() {
    let ctx = TestContext::new();
    ctx.fake.add_disk("busy.vhdx");
    ctx.fake.fail_next(Op::Detach, NativeError::ACCESS_DENIED);

    let err = ctx.service.detach_disk(Path::new("busy.vhdx")).unwrap_err();

    assert!(matches!(&err, VhdliteError::Storage(msg) if msg.contains("detach busy.vhdx")));
    assert_eq!(ctx.fake.ops(), vec![Op::Open, Op::Detach, Op::Close]);
    assert_eq!(ctx.fake.closed_count(), 1);
    assert_eq!(ctx.fake.live_handles(), 0);
    assert!(ctx.fake.disk("busy.vhdx").unwrap().attached);
}

// ============================================================================
// OPEN
// ============================================================================

#[test]
fn open_disk_hands_ownership_to_caller() {
    let ctx = TestContext::new();
    ctx.fake.add_disk("data.vhdx");

    let handle = ctx
        .service
        .open_disk(Path::new("data.vhdx"), &OpenDiskOptions::info_only())
        .unwrap();
    assert_eq!(ctx.fake.live_handles(), 1);
    assert_eq!(handle.path(), Path::new("data.vhdx"));

    match &ctx.fake.calls()[0] {
        Call::Open {
            version,
            get_info_only,
            read_only,
            ..
        } => {
            assert_eq!(*version, Some(2));
            assert!(*get_info_only);
            assert!(!*read_only);
        }
        other => panic!("expected open, got {other:?}"),
    }

    handle.close().unwrap();
    assert_eq!(ctx.fake.live_handles(), 0);
}

#[test]
fn open_with_access_and_parameter_block_is_rejected_locally() {
    let ctx = TestContext::new();
    ctx.fake.add_disk("data.vhdx");
    let options = OpenDiskOptions {
        access: VirtualDiskAccess::ATTACH_RO,
        ..Default::default()
    };

    let err = ctx
        .service
        .open_disk(Path::new("data.vhdx"), &options)
        .unwrap_err();

    assert!(matches!(err, VhdliteError::InvalidArgument(_)));
    assert!(ctx.fake.calls().is_empty());
}
