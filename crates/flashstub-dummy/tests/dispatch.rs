//! Cache guard symmetry and request handling on the emulated target

use flashstub_core::cache::{self, CacheRegions};
use flashstub_core::entry::Stub;
use flashstub_core::error::RomCode;
use flashstub_core::platform::CoreId;
use flashstub_core::{CommandId, FlashCommand, PollLimit, RawRequest, Request, Status, StubConfig};
use flashstub_dummy::{
    CacheEvent, EmulatedCaches, EmulatedFlash, EmulatedTarget, FaultPlan, FlashConfig, FlashOp,
    RingStorage,
};
use proptest::prelude::*;

const PRO_MASK: u32 = 0x3D;
const APP_MASK: u32 = 0x17;

fn target(core: CoreId) -> EmulatedTarget {
    EmulatedTarget::new(
        EmulatedFlash::new(FlashConfig {
            size: 0x40000,
            require_unlock: true,
        }),
        EmulatedCaches::new(PRO_MASK, APP_MASK),
        core,
    )
}

fn snapshots(target: &EmulatedTarget) -> [(bool, u32); 2] {
    [
        target.caches.snapshot(CoreId::Pro),
        target.caches.snapshot(CoreId::App),
    ]
}

fn fault_plans() -> Vec<FaultPlan> {
    vec![
        FaultPlan::default(),
        FaultPlan {
            unlock: Some(RomCode::Err),
            ..Default::default()
        },
        FaultPlan {
            read_at: Some(0x1000),
            ..Default::default()
        },
        FaultPlan {
            write_at: Some(0x1002),
            ..Default::default()
        },
        FaultPlan {
            erase: Some(RomCode::Timeout),
            ..Default::default()
        },
    ]
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Read,
    Write,
    StreamWrite,
    Erase,
    Test,
}

const KINDS: [Kind; 5] = [
    Kind::Read,
    Kind::Write,
    Kind::StreamWrite,
    Kind::Erase,
    Kind::Test,
];

/// Run one command of `kind` and hand back its status and the target
fn run_kind(kind: Kind, target: EmulatedTarget) -> (Status, EmulatedTarget) {
    let payload: Vec<u8> = (0..40).collect();
    let mut buf = vec![0u8; 10];
    let ring = RingStorage::new(64);

    let (config, command) = match kind {
        Kind::Read => (
            StubConfig::new(),
            FlashCommand::Read {
                addr: 0x0FFE,
                buf: &mut buf,
            },
        ),
        Kind::Write => (
            StubConfig::new(),
            FlashCommand::Write {
                addr: 0x1001,
                data: &payload[..10],
            },
        ),
        Kind::StreamWrite => {
            let producer = ring.producer().unwrap();
            assert_eq!(producer.push(&payload), payload.len());
            (
                StubConfig::new()
                    .with_write_mode(flashstub_core::WriteMode::Streaming)
                    .with_bounded_polling(1000),
                FlashCommand::StreamWrite {
                    addr: 0x1000,
                    size: payload.len() as u32,
                    ring: ring.consumer().unwrap(),
                },
            )
        }
        Kind::Erase => (
            StubConfig::new(),
            FlashCommand::Erase {
                addr: 0x1800,
                size: 0x1000,
            },
        ),
        Kind::Test => (
            StubConfig::new().with_self_test_addr(0x1000),
            FlashCommand::Test,
        ),
    };

    let mut stub = Stub::new(target, config);
    let status = stub.handle(Request::Flash(command));
    (status, stub.into_platform())
}

#[test]
fn test_guard_symmetry_for_every_command() {
    for kind in KINDS {
        for core in [CoreId::Pro, CoreId::App] {
            for faults in fault_plans() {
                let mut target = target(core);
                target.flash.set_faults(faults.clone());
                let before = snapshots(&target);

                let (status, target) = run_kind(kind, target);

                let ctx = format!("{:?} on {} with {:?}", kind, core, faults);
                assert_eq!(snapshots(&target), before, "{}", ctx);
                assert_eq!(target.violations(), 0, "{}", ctx);
                if faults.unlock.is_some() {
                    assert_eq!(status, Status::Fail, "{}", ctx);
                    assert_eq!(target.flash.ops(), [FlashOp::Unlock], "{}", ctx);
                }

                let sibling = core.sibling();
                assert_eq!(
                    target.caches.toggles(),
                    [
                        CacheEvent::Disabled(sibling),
                        CacheEvent::Disabled(core),
                        CacheEvent::Enabled(core),
                        CacheEvent::Enabled(sibling),
                    ],
                    "{}",
                    ctx
                );
            }
        }
    }
}

#[test]
fn test_failing_primitives_report_fail() {
    let cases = [
        (
            Kind::Read,
            FaultPlan {
                read_at: Some(0x1000),
                ..Default::default()
            },
        ),
        (
            Kind::Write,
            FaultPlan {
                write_at: Some(0x1002),
                ..Default::default()
            },
        ),
        (
            Kind::StreamWrite,
            FaultPlan {
                write_at: Some(0x1002),
                ..Default::default()
            },
        ),
        (
            Kind::Erase,
            FaultPlan {
                erase: Some(RomCode::Err),
                ..Default::default()
            },
        ),
        (
            Kind::Test,
            FaultPlan {
                erase: Some(RomCode::Err),
                ..Default::default()
            },
        ),
    ];

    for (kind, faults) in cases {
        let mut target = target(CoreId::Pro);
        target.flash.set_faults(faults);
        let (status, target) = run_kind(kind, target);
        assert_eq!(status, Status::Fail, "{:?}", kind);
        assert_eq!(snapshots(&target), [(true, PRO_MASK), (true, APP_MASK)]);
    }
}

#[test]
fn test_successful_commands_report_ok() {
    for kind in KINDS {
        let (status, target) = run_kind(kind, target(CoreId::App));
        assert_eq!(status, Status::Ok, "{:?}", kind);
        assert_eq!(target.violations(), 0);
    }
}

#[test]
fn test_stuck_cache_with_bounded_polling() {
    let config = StubConfig::new().with_bounded_polling(50);

    for stuck in [CoreId::Pro, CoreId::App] {
        let mut target = target(CoreId::Pro);
        target.caches.set_stuck(stuck, true);

        let mut stub = Stub::new(target, config);
        let status = stub.handle(Request::Flash(FlashCommand::Erase {
            addr: 0,
            size: 0x1000,
        }));
        let target = stub.into_platform();

        assert_eq!(status, Status::Fail);
        assert!(target.flash.ops().is_empty());
        assert_eq!(snapshots(&target), [(true, PRO_MASK), (true, APP_MASK)]);
    }
}

#[test]
fn test_unsupported_ids_touch_nothing() {
    for cmd in [-1, 5, 6, 0x100, i32::MIN, i32::MAX] {
        let mut stub = Stub::new(target(CoreId::Pro), StubConfig::new());
        // SAFETY: unknown identifiers never dereference their arguments
        let status = unsafe { stub.handle_raw(&RawRequest::new(cmd, [0x1000, 4, 0, 0])) };
        let target = stub.into_platform();

        assert_eq!(status, Status::NotSupported);
        assert_eq!(status.code(), -2);
        assert!(target.flash.ops().is_empty());
        assert!(target.caches.events().is_empty());
        assert_eq!(target.caches.state_polls(), 0);
    }
}

#[test]
fn test_self_check_touches_nothing() {
    let mut stub = Stub::new(target(CoreId::Pro), StubConfig::new());
    // SAFETY: TEST takes no arguments
    let status = unsafe { stub.handle_raw(&RawRequest::new(CommandId::Test.raw(), [0; 4])) };
    let target = stub.into_platform();

    assert_eq!(status.code(), 0);
    assert!(target.flash.ops().is_empty());
    assert!(target.caches.events().is_empty());
}

#[test]
fn test_end_to_end_unaligned_tail_write() {
    let data: [u8; 10] = core::array::from_fn(|i| i as u8);
    let mut stub = Stub::new(target(CoreId::Pro), StubConfig::new());

    let raw = RawRequest::new(
        CommandId::FlashWrite.raw(),
        [0x1000, data.len(), data.as_ptr() as usize, 0],
    );
    // SAFETY: the pointer and length describe `data`
    let status = unsafe { stub.handle_raw(&raw) };
    let target = stub.into_platform();

    assert_eq!(status.code(), 0);
    assert_eq!(
        target.flash.ops(),
        [
            FlashOp::Unlock,
            FlashOp::Write {
                addr: 0x1000,
                data: data[..8].to_vec(),
            },
            FlashOp::Read {
                addr: 0x1008,
                len: 4,
            },
            FlashOp::Write {
                addr: 0x1008,
                data: vec![8, 9, 0xFF, 0xFF],
            },
        ]
    );
    assert_eq!(&target.flash.data()[0x1000..0x100C], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xFF, 0xFF]);
}

#[test]
fn test_raw_read_into_caller_buffer() {
    let mut image = vec![0xFFu8; 0x2000];
    image[0x1001..0x1006].copy_from_slice(b"stub!");
    let flash = EmulatedFlash::with_data(
        FlashConfig {
            size: 0x2000,
            require_unlock: true,
        },
        &image,
    );
    let mut stub = Stub::new(
        EmulatedTarget::new(flash, EmulatedCaches::new(PRO_MASK, APP_MASK), CoreId::Pro),
        StubConfig::new(),
    );

    let mut buf = [0u8; 5];
    let raw = RawRequest::new(
        CommandId::FlashRead.raw(),
        [0x1001, buf.len(), buf.as_mut_ptr() as usize, 0],
    );
    // SAFETY: the pointer and length describe `buf`, which outlives the call
    let status = unsafe { stub.handle_raw(&raw) };

    assert_eq!(status, Status::Ok);
    assert_eq!(&buf, b"stub!");
}

#[test]
fn test_null_buffer_rejected_before_guard() {
    let mut stub = Stub::new(target(CoreId::Pro), StubConfig::new());
    let raw = RawRequest::new(CommandId::FlashWrite.raw(), [0x1000, 8, 0, 0]);
    // SAFETY: a null pointer is refused by the decoder
    let status = unsafe { stub.handle_raw(&raw) };
    let target = stub.into_platform();

    assert_eq!(status, Status::Fail);
    assert!(target.caches.events().is_empty());
    assert!(target.flash.ops().is_empty());
}

proptest! {
    #[test]
    fn test_cache_round_trip(mask in any::<u32>(), busy in 0u32..20, pro in any::<bool>()) {
        let core = if pro { CoreId::Pro } else { CoreId::App };
        let mut caches = EmulatedCaches::new(mask, mask.rotate_left(7));
        caches.set_busy_polls(core, busy);
        let before = caches.snapshot(core);

        let state = cache::disable(&mut caches, core, PollLimit::Forever).unwrap();
        prop_assert!(!caches.is_enabled(core));
        let core_mask = if pro { mask } else { mask.rotate_left(7) };
        prop_assert_eq!(state.regions(), CacheRegions::from_bits_truncate(core_mask));
        cache::restore(&mut caches, state);

        prop_assert_eq!(caches.snapshot(core), before);
        let sibling_mask = if pro { mask.rotate_left(7) } else { mask };
        prop_assert_eq!(caches.snapshot(core.sibling()), (true, sibling_mask));
    }
}
