//! Single-word shared memory segment.

use crate::error::{ShmError, ShmResult};
use crate::platform::linux::{Access, map_segment};
use iomux_common::shm::consts::SEGMENT_SIZE;
use memmap2::MmapRaw;
use std::sync::atomic::{AtomicU32, Ordering};

/// A named segment holding one 32-bit word at offset 0.
///
/// The word is accessed atomically, so a reader in another process sees
/// either the previous or the new value, never a torn one.
#[derive(Debug)]
pub struct WordSegment {
    name: String,
    map: MmapRaw,
    writable: bool,
}

impl WordSegment {
    /// Create the segment if absent (or re-attach a leftover one) and size it.
    pub fn create(name: &str) -> ShmResult<Self> {
        Self::open_with(name, Access::Create)
    }

    /// Attach an existing segment read-write.
    pub fn open(name: &str) -> ShmResult<Self> {
        Self::open_with(name, Access::ReadWrite)
    }

    /// Attach an existing segment read-only.
    pub fn open_read_only(name: &str) -> ShmResult<Self> {
        Self::open_with(name, Access::ReadOnly)
    }

    fn open_with(name: &str, access: Access) -> ShmResult<Self> {
        let map = map_segment(name, SEGMENT_SIZE, access)?;
        Ok(Self {
            name: name.to_string(),
            map,
            writable: access != Access::ReadOnly,
        })
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the mapping accepts writes.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    #[inline]
    fn word(&self) -> &AtomicU32 {
        // SAFETY: the mapping is page-aligned, at least SEGMENT_SIZE bytes
        // long and lives as long as `self`. AtomicU32 has the layout of u32.
        unsafe { &*(self.map.as_ptr() as *const AtomicU32) }
    }

    /// Current word value.
    #[inline]
    pub fn load(&self) -> u32 {
        self.word().load(Ordering::Acquire)
    }

    /// Replace the word value.
    #[inline]
    pub fn store(&self, value: u32) -> ShmResult<()> {
        self.swap(value).map(|_| ())
    }

    /// Replace the word value, returning the previous one.
    #[inline]
    pub fn swap(&self, value: u32) -> ShmResult<u32> {
        if !self.writable {
            return Err(ShmError::ReadOnly {
                name: self.name.clone(),
            });
        }
        Ok(self.word().swap(value, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::linux::unlink_segment;

    fn unique(tag: &str) -> String {
        format!("/iomux_seg_{}_{}", std::process::id(), tag)
    }

    #[test]
    fn create_store_and_reopen() {
        let name = unique("reopen");
        let writer = WordSegment::create(&name).unwrap();
        assert_eq!(writer.load(), 0);
        writer.store(0xDEAD_BEEF).unwrap();

        let reader = WordSegment::open_read_only(&name).unwrap();
        assert_eq!(reader.load(), 0xDEAD_BEEF);
        assert!(!reader.is_writable());

        assert_eq!(writer.swap(7).unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.load(), 7);

        assert!(unlink_segment(&name).unwrap());
    }

    #[test]
    fn read_only_rejects_writes() {
        let name = unique("ro");
        let _writer = WordSegment::create(&name).unwrap();
        let reader = WordSegment::open_read_only(&name).unwrap();
        assert!(matches!(reader.store(1), Err(ShmError::ReadOnly { .. })));
        unlink_segment(&name).unwrap();
    }

    #[test]
    fn open_missing_is_not_found() {
        let name = unique("missing");
        assert!(matches!(
            WordSegment::open(&name),
            Err(ShmError::NotFound { .. })
        ));
        assert!(!unlink_segment(&name).unwrap());
    }
}
