//! Shared state store tests against real POSIX shared memory.

use iomux_common::mux::pins::PinMask;
use iomux_common::shm::names::SegmentNames;
use iomux_shared_memory::{NamedSemaphore, SharedStateStore, ShmError, ShmResult, WordSegment};
use proptest::prelude::*;

/// Per-test names so parallel tests never share objects.
fn names(tag: &str) -> SegmentNames {
    SegmentNames::new(&format!("iomux_test_{}_{}", std::process::id(), tag))
}

fn cleanup(names: &SegmentNames) {
    let _ = SharedStateStore::unlink_names(names);
}

#[test]
fn attach_starts_zeroed() -> ShmResult<()> {
    let names = names("zeroed");
    cleanup(&names);

    let store = SharedStateStore::attach(&names)?;
    assert_eq!(store.read_pin_mask(), PinMask::empty());
    assert_eq!(store.read_bus_value(), 0);
    assert_eq!(store.read_interrupt_value(), 0);
    assert_eq!(store.read_overlay(), 0);
    assert_eq!(store.revision_count()?, 0);

    store.detach_and_unlink()
}

#[test]
fn pin_mask_posts_once_per_change() -> ShmResult<()> {
    let names = names("posts");
    cleanup(&names);
    let store = SharedStateStore::attach(&names)?;

    assert!(store.write_pin_mask(PinMask::from_bits_retain(0x55))?);
    assert!(!store.write_pin_mask(PinMask::from_bits_retain(0x55))?);
    assert_eq!(store.revision_count()?, 1);

    assert!(store.write_pin_mask(PinMask::empty())?);
    assert_eq!(store.revision_count()?, 2);

    assert!(store.try_wait_revision()?);
    assert!(store.try_wait_revision()?);
    assert!(!store.try_wait_revision()?);

    store.detach_and_unlink()
}

#[test]
fn samples_round_trip_signed() -> ShmResult<()> {
    let names = names("signed");
    cleanup(&names);
    let store = SharedStateStore::attach(&names)?;

    store.write_bus_value(-1)?;
    store.write_interrupt_value(42)?;
    assert_eq!(store.read_bus_value(), -1);
    assert_eq!(store.read_interrupt_value(), 42);

    store.write_interrupt_value(i32::MIN)?;
    assert_eq!(store.read_interrupt_value(), i32::MIN);

    store.detach_and_unlink()
}

#[test]
fn consumer_sees_core_writes() -> ShmResult<()> {
    let names = names("consumer");
    cleanup(&names);
    let core = SharedStateStore::attach(&names)?;
    let consumer = SharedStateStore::open_existing(&names)?;

    core.write_pin_mask(PinMask::PIN0 | PinMask::PIN4)?;
    core.write_bus_value(17)?;

    assert!(consumer.try_wait_revision()?);
    assert_eq!(consumer.read_pin_mask().bits(), 0x11);
    assert_eq!(consumer.read_bus_value(), 17);

    drop(consumer);
    core.detach_and_unlink()
}

#[test]
fn overlay_attaches_late() -> ShmResult<()> {
    let names = names("overlay");
    cleanup(&names);
    let core = SharedStateStore::attach(&names)?;
    assert!(!core.attach_overlay());
    assert_eq!(core.read_overlay(), 0);

    let consumer = SharedStateStore::open_existing(&names)?;
    consumer.write_overlay(0b0110)?;

    assert!(core.attach_overlay());
    assert_eq!(core.read_overlay(), 0b0110);

    drop(consumer);
    core.detach_and_unlink()
}

#[test]
fn open_existing_requires_a_running_core() {
    let names = names("absent");
    cleanup(&names);
    assert!(matches!(
        SharedStateStore::open_existing(&names),
        Err(ShmError::NotFound { .. })
    ));
}

#[test]
fn attach_after_crash_starts_fresh() -> ShmResult<()> {
    let names = names("leftover");
    cleanup(&names);

    // A run that dies before shutdown leaves its objects behind.
    let crashed = SharedStateStore::attach(&names)?;
    crashed.write_pin_mask(PinMask::PIN0 | PinMask::PIN4)?;
    crashed.write_pin_mask(PinMask::PIN1 | PinMask::PIN5)?;
    crashed.write_bus_value(-7)?;
    crashed.write_interrupt_value(12)?;
    drop(crashed);

    let store = SharedStateStore::attach(&names)?;
    assert_eq!(store.read_pin_mask(), PinMask::empty());
    assert_eq!(store.read_bus_value(), 0);
    assert_eq!(store.read_interrupt_value(), 0);
    assert_eq!(store.revision_count()?, 0);

    // Priming the same mask as the crashed run is still a revision.
    assert!(store.write_pin_mask(PinMask::PIN1 | PinMask::PIN5)?);
    assert_eq!(store.revision_count()?, 1);
    store.detach_and_unlink()
}

#[test]
fn attach_keeps_presentation_overlay() -> ShmResult<()> {
    let names = names("keep_overlay");
    cleanup(&names);
    WordSegment::create(&names.command)?.store(0b0011)?;

    let store = SharedStateStore::attach(&names)?;
    assert_eq!(store.read_overlay(), 0b0011);
    store.detach_and_unlink()
}

#[test]
fn detach_removes_every_name() -> ShmResult<()> {
    let names = names("unlink");
    cleanup(&names);
    let store = SharedStateStore::attach(&names)?;
    store.write_overlay(1)?;
    store.detach_and_unlink()?;

    for name in names.segments() {
        assert!(matches!(
            WordSegment::open(name),
            Err(ShmError::NotFound { .. })
        ));
    }
    assert!(matches!(
        NamedSemaphore::open(&names.revision),
        Err(ShmError::NotFound { .. })
    ));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn revisions_count_changes(masks in proptest::collection::vec(0u32..=0xFF, 1..40)) {
        let names = names("prop");
        cleanup(&names);
        let store = SharedStateStore::attach(&names).unwrap();

        let mut expected = 0u32;
        let mut last = 0u32;
        for bits in masks {
            let changed = store.write_pin_mask(PinMask::from_bits_retain(bits)).unwrap();
            prop_assert_eq!(changed, bits != last);
            if changed {
                expected += 1;
            }
            last = bits;
        }
        prop_assert_eq!(store.read_pin_mask().bits(), last);
        prop_assert_eq!(store.revision_count().unwrap(), expected);

        store.detach_and_unlink().unwrap();
    }
}
