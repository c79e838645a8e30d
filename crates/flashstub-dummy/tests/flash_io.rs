//! Aligned read/write/erase through the dispatcher on the emulated target

use flashstub_core::cache::CacheRegions;
use flashstub_core::dispatch::dispatch;
use flashstub_core::platform::{CoreId, ERASED_BYTE, SECTOR_SIZE};
use flashstub_core::{FlashCommand, Status, StubConfig};
use flashstub_dummy::{EmulatedCaches, EmulatedFlash, EmulatedTarget, FlashConfig};
use proptest::prelude::*;

const FLASH_SIZE: usize = 0x10000;

fn target_with(data: &[u8]) -> EmulatedTarget {
    let config = FlashConfig {
        size: FLASH_SIZE,
        require_unlock: true,
    };
    let regions = CacheRegions::all().bits();
    EmulatedTarget::new(
        EmulatedFlash::with_data(config, data),
        EmulatedCaches::new(regions, regions),
        CoreId::Pro,
    )
}

fn run(target: &mut EmulatedTarget, command: FlashCommand<'_>) -> Status {
    dispatch(target, &StubConfig::new(), command)
}

fn patterned() -> Vec<u8> {
    (0..FLASH_SIZE).map(|i| (i * 7 + 3) as u8 & 0x7F).collect()
}

proptest! {
    #[test]
    fn test_write_read_round_trip(
        addr in 0u32..0x8000,
        data in proptest::collection::vec(any::<u8>(), 0..300),
    ) {
        let mut target = target_with(&patterned());
        let len = data.len() as u32;

        prop_assert_eq!(run(&mut target, FlashCommand::Erase { addr, size: len }), Status::Ok);

        let mut before = vec![0u8; data.len()];
        prop_assert_eq!(run(&mut target, FlashCommand::Read { addr, buf: &mut before }), Status::Ok);
        prop_assert!(before.iter().all(|&b| b == ERASED_BYTE));

        prop_assert_eq!(run(&mut target, FlashCommand::Write { addr, data: &data }), Status::Ok);

        let mut after = vec![0u8; data.len()];
        prop_assert_eq!(run(&mut target, FlashCommand::Read { addr, buf: &mut after }), Status::Ok);
        prop_assert_eq!(after, data);
        prop_assert_eq!(target.violations(), 0);
    }

    #[test]
    fn test_partial_word_write_preserves_neighbours(
        word in 0u32..0x400,
        offset in 0u32..4,
        extra in 0u32..4,
        fill in any::<u8>(),
    ) {
        let image = patterned();
        let mut target = target_with(&image);
        let base = word * 4;
        let addr = base + offset;
        let len = (extra + 1).min(4 - offset) as usize;
        let data = vec![fill; len];

        prop_assert_eq!(run(&mut target, FlashCommand::Write { addr, data: &data }), Status::Ok);

        let flash = target.flash.data();
        for i in base..base + 4 {
            let touched = (addr..addr + len as u32).contains(&i);
            if !touched {
                prop_assert_eq!(flash[i as usize], image[i as usize]);
            } else {
                prop_assert_eq!(flash[i as usize], image[i as usize] & fill);
            }
        }
    }

    #[test]
    fn test_erase_covers_sector_superset(addr in 0u32..0xC000, len in 1u32..0x3000) {
        let image = patterned();
        let mut target = target_with(&image);

        prop_assert_eq!(run(&mut target, FlashCommand::Erase { addr, size: len }), Status::Ok);

        let start = (addr / SECTOR_SIZE * SECTOR_SIZE) as usize;
        let end = (addr + len).div_ceil(SECTOR_SIZE) as usize * SECTOR_SIZE as usize;
        let flash = target.flash.data();
        prop_assert!(flash[start..end].iter().all(|&b| b == ERASED_BYTE));
        prop_assert_eq!(&flash[..start], &image[..start]);
        prop_assert_eq!(&flash[end..], &image[end..]);
    }
}

#[test]
fn test_zero_length_operations_touch_nothing() {
    let image = patterned();
    let mut target = target_with(&image);

    assert_eq!(run(&mut target, FlashCommand::Erase { addr: 0x1234, size: 0 }), Status::Ok);
    assert_eq!(run(&mut target, FlashCommand::Write { addr: 0x1235, data: &[] }), Status::Ok);
    assert_eq!(run(&mut target, FlashCommand::Read { addr: 0x1236, buf: &mut [] }), Status::Ok);

    assert_eq!(target.flash.data(), &image[..]);
    assert!(target
        .flash
        .ops()
        .iter()
        .all(|op| *op == flashstub_dummy::FlashOp::Unlock));
}

#[test]
fn test_self_test_leaves_pattern() {
    let mut target = target_with(&[]);
    let config = StubConfig::new().with_self_test_addr(0x8000);

    assert_eq!(dispatch(&mut target, &config, FlashCommand::Test), Status::Ok);
    assert_eq!(
        &target.flash.data()[0x8000..0x8020],
        &flashstub_core::flash::SELF_TEST_PATTERN
    );
}

#[test]
fn test_self_test_fails_on_erase_error() {
    let mut target = target_with(&[]);
    let config = StubConfig::new().with_self_test_addr(0x8000);
    target.flash.set_faults(flashstub_dummy::FaultPlan {
        erase: Some(flashstub_core::error::RomCode::Timeout),
        ..Default::default()
    });

    assert_eq!(dispatch(&mut target, &config, FlashCommand::Test), Status::Fail);
}
