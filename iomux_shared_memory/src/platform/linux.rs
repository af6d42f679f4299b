//! Linux-specific shared memory operations

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapOptions, MmapRaw};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;

/// Permissions of newly created objects. Consumers run as other users.
pub const OBJECT_MODE: u32 = 0o666;

/// How a segment is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Create if absent, truncate to size, map read-write.
    Create,
    /// Existing segment, map read-write.
    ReadWrite,
    /// Existing segment, map read-only.
    ReadOnly,
}

/// Open (or create) a named segment and map exactly `size` bytes of it.
pub fn map_segment(name: &str, size: usize, access: Access) -> ShmResult<MmapRaw> {
    let flags = match access {
        Access::Create => OFlag::O_CREAT | OFlag::O_RDWR,
        Access::ReadWrite => OFlag::O_RDWR,
        Access::ReadOnly => OFlag::O_RDONLY,
    };
    let fd = shm_open(name, flags, Mode::from_bits_truncate(OBJECT_MODE))
        .map_err(|errno| ShmError::from_errno(name, errno))?;
    let file = File::from(fd);

    if access == Access::Create {
        file.set_len(size as u64)?;
    } else {
        let actual = file.metadata()?.len();
        if actual < size as u64 {
            return Err(ShmError::InvalidSize {
                name: name.to_string(),
                size: actual,
                expected: size,
            });
        }
    }

    let mut options = MmapOptions::new();
    options.len(size);
    let map = match access {
        Access::ReadOnly => options.map_raw_read_only(&file)?,
        Access::Create | Access::ReadWrite => options.map_raw(&file)?,
    };
    Ok(map)
}

/// Remove a segment name. Returns `false` if it did not exist.
pub fn unlink_segment(name: &str) -> ShmResult<bool> {
    match shm_unlink(name) {
        Ok(()) => Ok(true),
        Err(Errno::ENOENT) => Ok(false),
        Err(errno) => Err(ShmError::from_errno(name, errno)),
    }
}
