//! The shared state store: pin mask, bus sample, interrupt sample, the
//! requested-output overlay and the pin revision semaphore.
//!
//! One writer per word. The core writes the pin mask and both samples;
//! the presentation process writes the overlay. The semaphore is posted
//! once per pin mask change.

use crate::error::ShmResult;
use crate::platform::linux::unlink_segment;
use crate::segment::WordSegment;
use crate::semaphore::NamedSemaphore;
use iomux_common::mux::pins::PinMask;
use iomux_common::shm::names::SegmentNames;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Handles to every shared object of one multiplexer instance.
///
/// `Sync`: each word has a single writer, so the store is shared between
/// the pin loop and the samplers behind an `Arc`.
#[derive(Debug)]
pub struct SharedStateStore {
    names: SegmentNames,
    pins: WordSegment,
    bus: WordSegment,
    interrupt: WordSegment,
    overlay: OnceLock<WordSegment>,
    revision: NamedSemaphore,
}

impl SharedStateStore {
    /// Create all segments and the semaphore from scratch.
    ///
    /// Objects left behind by a run that never reached shutdown are
    /// unlinked first, so the new store starts with zeroed words and no
    /// pending revisions. The overlay belongs to the presentation process
    /// and is left alone. On failure, every object this call may have
    /// created is unlinked again.
    pub fn attach(names: &SegmentNames) -> ShmResult<Self> {
        if Self::unlink_owned(names)? {
            warn!("Removed leftover shared state for {}", names.pins);
        }
        let result = Self::create_all(names);
        if let Err(e) = &result {
            warn!("Shared state attach failed: {}; unlinking partial objects", e);
            let _ = Self::unlink_owned(names);
        }
        let store = result?;
        info!(
            "Shared state attached: {}, {}, {}, semaphore {}",
            names.pins, names.bus, names.interrupt, names.revision
        );
        store.attach_overlay();
        Ok(store)
    }

    /// Unlink the objects the core creates. Returns whether any existed.
    fn unlink_owned(names: &SegmentNames) -> ShmResult<bool> {
        let mut existed = false;
        for name in [&names.pins, &names.bus, &names.interrupt] {
            existed |= unlink_segment(name)?;
        }
        existed |= NamedSemaphore::unlink(&names.revision)?;
        Ok(existed)
    }

    fn create_all(names: &SegmentNames) -> ShmResult<Self> {
        Ok(Self {
            names: names.clone(),
            pins: WordSegment::create(&names.pins)?,
            bus: WordSegment::create(&names.bus)?,
            interrupt: WordSegment::create(&names.interrupt)?,
            overlay: OnceLock::new(),
            revision: NamedSemaphore::create(&names.revision)?,
        })
    }

    /// Attach an existing store without creating anything.
    ///
    /// Used by consumers. The overlay is the only word a consumer writes,
    /// through [`Self::write_overlay`].
    pub fn open_existing(names: &SegmentNames) -> ShmResult<Self> {
        let store = Self {
            names: names.clone(),
            pins: WordSegment::open(&names.pins)?,
            bus: WordSegment::open(&names.bus)?,
            interrupt: WordSegment::open(&names.interrupt)?,
            overlay: OnceLock::new(),
            revision: NamedSemaphore::open(&names.revision)?,
        };
        if let Ok(segment) = WordSegment::open(&names.command) {
            let _ = store.overlay.set(segment);
        }
        Ok(store)
    }

    /// Names of the attached objects.
    pub fn names(&self) -> &SegmentNames {
        &self.names
    }

    /// Current pin mask.
    pub fn read_pin_mask(&self) -> PinMask {
        PinMask::from_bits_retain(self.pins.load())
    }

    /// Publish a pin mask and post the revision semaphore.
    ///
    /// Writing the value already present is a no-op: nothing is posted and
    /// `false` is returned.
    pub fn write_pin_mask(&self, mask: PinMask) -> ShmResult<bool> {
        let previous = self.pins.swap(mask.bits())?;
        if previous == mask.bits() {
            return Ok(false);
        }
        self.revision.post()?;
        debug!("Pin mask {:#04x} -> {:#04x}", previous, mask.bits());
        Ok(true)
    }

    /// Latest bus sample.
    pub fn read_bus_value(&self) -> i32 {
        self.bus.load() as i32
    }

    /// Publish a bus sample (last write wins).
    pub fn write_bus_value(&self, value: i32) -> ShmResult<()> {
        self.bus.store(value as u32)
    }

    /// Latest interrupt sample.
    pub fn read_interrupt_value(&self) -> i32 {
        self.interrupt.load() as i32
    }

    /// Publish an interrupt sample (last write wins).
    pub fn write_interrupt_value(&self, value: i32) -> ShmResult<()> {
        self.interrupt.store(value as u32)
    }

    /// Try to attach the overlay segment read-only if not yet attached.
    ///
    /// Returns whether the overlay is attached. The overlay is created by
    /// the presentation process, so its absence is normal.
    pub fn attach_overlay(&self) -> bool {
        if self.overlay.get().is_some() {
            return true;
        }
        match WordSegment::open_read_only(&self.names.command) {
            Ok(segment) => {
                info!("Requested-output overlay attached: {}", segment.name());
                let _ = self.overlay.set(segment);
                true
            }
            Err(e) => {
                debug!("Overlay {} not available: {}", self.names.command, e);
                false
            }
        }
    }

    /// Current overlay bits, 0 while no overlay is attached.
    pub fn read_overlay(&self) -> u32 {
        self.overlay.get().map_or(0, WordSegment::load)
    }

    /// Consumer side: create the overlay segment if needed and write it.
    pub fn write_overlay(&self, value: u32) -> ShmResult<()> {
        if let Some(segment) = self.overlay.get().filter(|s| s.is_writable()) {
            return segment.store(value);
        }
        let segment = WordSegment::create(&self.names.command)?;
        segment.store(value)
    }

    /// Consume one pin revision if available.
    pub fn try_wait_revision(&self) -> ShmResult<bool> {
        self.revision.try_wait()
    }

    /// Pending pin revisions.
    pub fn revision_count(&self) -> ShmResult<u32> {
        self.revision.value()
    }

    /// Unmap everything and remove all names, including the overlay.
    pub fn detach_and_unlink(self) -> ShmResult<()> {
        let names = self.names.clone();
        drop(self);
        Self::unlink_names(&names)?;
        info!("Shared state unlinked ({})", names.pins);
        Ok(())
    }

    /// Remove every object name derived from `names`.
    ///
    /// Missing objects are ignored; the first other error is returned after
    /// all removals were attempted.
    pub fn unlink_names(names: &SegmentNames) -> ShmResult<()> {
        let mut first_error = None;
        for name in names.segments() {
            if let Err(e) = unlink_segment(name) {
                warn!("Failed to unlink {}: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = NamedSemaphore::unlink(&names.revision) {
            warn!("Failed to unlink {}: {}", names.revision, e);
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }
}
