//! Error types for shared state operations

use nix::errno::Errno;
use thiserror::Error;

/// Errors that can occur during shared state operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment or semaphore not found
    #[error("Shared object not found: {name}")]
    NotFound {
        /// Object name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing shared object: {name}")]
    PermissionDenied {
        /// Object name
        name: String,
    },

    /// Name rejected by the OS or not representable as a C string
    #[error("Invalid shared object name: {name:?}")]
    InvalidName {
        /// Object name
        name: String,
    },

    /// Existing segment is smaller than one word
    #[error("Segment {name} is {size} bytes, expected at least {expected}")]
    InvalidSize {
        /// Segment name
        name: String,
        /// Actual size in bytes
        size: u64,
        /// Required size in bytes
        expected: usize,
    },

    /// Write attempted through a read-only attachment
    #[error("Segment {name} is attached read-only")]
    ReadOnly {
        /// Segment name
        name: String,
    },

    /// Semaphore operation failed
    #[error("Semaphore {operation} failed on {name}: {source}")]
    Semaphore {
        /// Failing libc call
        operation: &'static str,
        /// Semaphore name
        name: String,
        /// OS error
        source: Errno,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

impl ShmError {
    /// Classify an errno returned while opening `name`.
    pub(crate) fn from_errno(name: &str, errno: Errno) -> Self {
        let name = name.to_string();
        match errno {
            Errno::ENOENT => Self::NotFound { name },
            Errno::EACCES | Errno::EPERM => Self::PermissionDenied { name },
            Errno::EINVAL | Errno::ENAMETOOLONG => Self::InvalidName { name },
            source => Self::Nix { source },
        }
    }

    /// Underlying OS error number, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::NotFound { .. } => Some(Errno::ENOENT as i32),
            Self::PermissionDenied { .. } => Some(Errno::EACCES as i32),
            Self::InvalidName { .. } | Self::InvalidSize { .. } => Some(Errno::EINVAL as i32),
            Self::ReadOnly { .. } => Some(Errno::EROFS as i32),
            Self::Semaphore { source, .. } | Self::Nix { source } => Some(*source as i32),
            Self::Io { source } => source.raw_os_error(),
        }
    }
}

/// Result type for shared state operations
pub type ShmResult<T> = Result<T, ShmError>;
