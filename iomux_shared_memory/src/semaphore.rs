//! Named POSIX semaphore used as a revision counter.

use crate::error::{ShmError, ShmResult};
use crate::platform::linux::OBJECT_MODE;
use nix::errno::Errno;
use std::ffi::CString;
use std::ptr::NonNull;

/// A named counting semaphore (`sem_open(3)`).
///
/// Only used as a notification counter: the writer posts once per
/// revision and consumers wait or poll. It never guards data.
#[derive(Debug)]
pub struct NamedSemaphore {
    name: String,
    sem: NonNull<libc::sem_t>,
}

// SAFETY: sem_post/sem_trywait/sem_getvalue are thread-safe and the handle
// is only closed in Drop.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> ShmResult<CString> {
    CString::new(name).map_err(|_| ShmError::InvalidName {
        name: name.to_string(),
    })
}

impl NamedSemaphore {
    /// Create with value 0, or open the existing one.
    pub fn create(name: &str) -> ShmResult<Self> {
        Self::open_with(name, true)
    }

    /// Open an existing semaphore.
    pub fn open(name: &str) -> ShmResult<Self> {
        Self::open_with(name, false)
    }

    fn open_with(name: &str, create: bool) -> ShmResult<Self> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string; the variadic
        // arguments match sem_open(3) when O_CREAT is given.
        let raw = unsafe {
            if create {
                libc::sem_open(
                    c_name.as_ptr(),
                    libc::O_CREAT,
                    OBJECT_MODE as libc::mode_t,
                    0 as libc::c_uint,
                )
            } else {
                libc::sem_open(c_name.as_ptr(), 0)
            }
        };
        if raw == libc::SEM_FAILED {
            return Err(ShmError::from_errno(name, Errno::last()));
        }
        let sem = NonNull::new(raw).ok_or_else(|| ShmError::InvalidName {
            name: name.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            sem,
        })
    }

    fn error(&self, operation: &'static str) -> ShmError {
        ShmError::Semaphore {
            operation,
            name: self.name.clone(),
            source: Errno::last(),
        }
    }

    /// Semaphore name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment the counter.
    pub fn post(&self) -> ShmResult<()> {
        // SAFETY: self.sem is a live handle from sem_open.
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(self.error("sem_post"))
        }
    }

    /// Decrement the counter if positive. Returns `false` if it was zero.
    pub fn try_wait(&self) -> ShmResult<bool> {
        loop {
            // SAFETY: self.sem is a live handle from sem_open.
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            match Errno::last() {
                Errno::EAGAIN => return Ok(false),
                Errno::EINTR => continue,
                _ => return Err(self.error("sem_trywait")),
            }
        }
    }

    /// Current counter value.
    pub fn value(&self) -> ShmResult<u32> {
        let mut value: libc::c_int = 0;
        // SAFETY: self.sem is a live handle; value is a valid out-pointer.
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } == 0 {
            Ok(value.max(0) as u32)
        } else {
            Err(self.error("sem_getvalue"))
        }
    }

    /// Remove a semaphore name. Returns `false` if it did not exist.
    pub fn unlink(name: &str) -> ShmResult<bool> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
            return Ok(true);
        }
        match Errno::last() {
            Errno::ENOENT => Ok(false),
            errno => Err(ShmError::from_errno(name, errno)),
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: the handle came from sem_open and is closed exactly once.
        unsafe {
            libc::sem_close(self.sem.as_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("/iomux_sem_{}_{}", std::process::id(), tag)
    }

    #[test]
    fn post_and_try_wait() {
        let name = unique("post");
        let sem = NamedSemaphore::create(&name).unwrap();
        assert_eq!(sem.value().unwrap(), 0);
        assert!(!sem.try_wait().unwrap());

        sem.post().unwrap();
        sem.post().unwrap();
        assert_eq!(sem.value().unwrap(), 2);

        let other = NamedSemaphore::open(&name).unwrap();
        assert!(other.try_wait().unwrap());
        assert_eq!(sem.value().unwrap(), 1);

        assert!(NamedSemaphore::unlink(&name).unwrap());
        assert!(!NamedSemaphore::unlink(&name).unwrap());
    }

    #[test]
    fn open_missing_is_not_found() {
        let name = unique("missing");
        assert!(matches!(
            NamedSemaphore::open(&name),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn interior_nul_rejected() {
        assert!(matches!(
            NamedSemaphore::create("/bad\0name"),
            Err(ShmError::InvalidName { .. })
        ));
    }
}
