//! Error types for the multiplexer core.
//!
//! - `PinError` - pin backend failures
//! - `SamplerError` - timer, bus and sensor failures
//! - `DecodeError` - malformed sensor text
//! - `MuxError` - top-level error surfaced to the process boundary

use iomux_common::config::ConfigError;
use iomux_shared_memory::ShmError;
use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Pin backend errors.
#[derive(Debug, Error)]
pub enum PinError {
    /// A control or value file could not be accessed.
    #[error("Pin file {path}: {source}")]
    File {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// A value file held something other than `0` or `1`.
    #[error("Invalid level {value:?} in {path}")]
    InvalidLevel {
        /// File path
        path: PathBuf,
        /// Text read
        value: String,
    },

    /// Line request or line operation failed on the character device.
    #[error("Line operation on {chip} failed: {source}")]
    Line {
        /// Chip device path
        chip: PathBuf,
        /// Underlying driver error
        source: gpio_cdev::Error,
    },

    /// Multiplexed wait failed.
    #[error("Pin wait failed: {0}")]
    Wait(#[from] Errno),

    /// Operation attempted before `request()` or after `release()`.
    #[error("Pin backend {0} is not requested")]
    NotRequested(&'static str),

    /// No backend registered under this name.
    #[error("Unknown pin backend: {0}")]
    UnknownBackend(String),

    /// A backend name was registered twice.
    #[error("Pin backend {0} is already registered")]
    DuplicateBackend(&'static str),
}

impl PinError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Underlying OS error number, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::File { source, .. } => source.raw_os_error(),
            Self::Wait(errno) => Some(*errno as i32),
            _ => None,
        }
    }
}

/// Malformed sensor reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing but whitespace was read.
    #[error("Sensor returned no data")]
    Empty,

    /// Bytes are not UTF-8 text.
    #[error("Sensor text is not valid UTF-8")]
    NotText,

    /// Text is not a base-10 signed 32-bit integer.
    #[error("Sensor text {0:?} is not an integer")]
    NotInteger(String),
}

/// Sampler worker errors.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Timer creation, arming or reading failed.
    #[error("Timer error: {0}")]
    Timer(#[source] Errno),

    /// Sensor wait failed.
    #[error("Sensor wait failed: {0}")]
    Wait(#[source] Errno),

    /// Register bus open or transfer failed.
    #[error("Bus {operation} failed: {message}")]
    Bus {
        /// Failing operation
        operation: &'static str,
        /// Driver error text
        message: String,
    },

    /// Sensor attribute file could not be accessed.
    #[error("Sensor file {path}: {source}")]
    SensorFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// Sensor text could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Publishing into shared state failed.
    #[error(transparent)]
    Shm(#[from] ShmError),
}

impl SamplerError {
    pub(crate) fn sensor_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SensorFile {
            path: path.into(),
            source,
        }
    }

    /// Underlying OS error number, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Timer(errno) | Self::Wait(errno) => Some(*errno as i32),
            Self::SensorFile { source, .. } => source.raw_os_error(),
            Self::Shm(e) => e.raw_os_error(),
            Self::Bus { .. } | Self::Decode(_) => None,
        }
    }
}

/// Top-level error of the multiplexer process.
#[derive(Debug, Error)]
pub enum MuxError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared state attach or unlink failed.
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Pin backend failed.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// Sampler failed.
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    /// Signal handler installation failed.
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Worker thread could not be spawned.
    #[error("Failed to spawn worker {name}: {source}")]
    Spawn {
        /// Worker name
        name: &'static str,
        /// Underlying IO error
        source: io::Error,
    },

    /// Lifecycle operation called in the wrong state.
    #[error("Invalid lifecycle transition: {0}")]
    InvalidState(String),
}

/// Whether the `count`-th occurrence of a repeating failure is logged:
/// the first ten, then every thousandth.
#[inline]
pub(crate) fn is_reported(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

impl MuxError {
    /// Process exit status for a fatal error: the OS errno when one is
    /// known, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        let errno = match self {
            Self::Shm(e) => e.raw_os_error(),
            Self::Pin(e) => e.raw_os_error(),
            Self::Sampler(e) => e.raw_os_error(),
            Self::Spawn { source, .. } => source.raw_os_error(),
            Self::Config(_) | Self::Signal(_) | Self::InvalidState(_) => None,
        };
        match errno {
            Some(code) if (1..=255).contains(&code) => code,
            _ => 1,
        }
    }
}
