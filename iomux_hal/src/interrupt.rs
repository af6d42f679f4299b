//! Interrupt-driven sensor sampler.
//!
//! The sensor driver exposes three attribute files in one directory:
//! `enable`, `enable_interrupt` and `data`. Interrupts are delivered as
//! priority readiness (`POLLPRI`) on `data`, after which the file is
//! re-read from offset 0 and its ASCII integer published.

use crate::error::{DecodeError, SamplerError, is_reported};
use crate::lifecycle::ShutdownFlag;
use crate::wait::wait_ready;
use iomux_common::mux::config::InterruptConfig;
use iomux_shared_memory::SharedStateStore;
use nix::poll::{PollFd, PollFlags};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Attribute that powers the sensor up.
pub const ENABLE_FILE: &str = "enable";
/// Attribute that routes the sensor interrupt.
pub const ENABLE_INTERRUPT_FILE: &str = "enable_interrupt";
/// Attribute holding the latest reading.
pub const DATA_FILE: &str = "data";

/// Parse one sensor reading.
pub fn decode_reading(raw: &[u8]) -> Result<i32, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotText)?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    text.parse::<i32>()
        .map_err(|_| DecodeError::NotInteger(text.to_string()))
}

/// Interrupt sampler counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InterruptStats {
    /// Wakeups handled.
    pub wakeups: u64,
    /// Readings published.
    pub samples: u64,
    /// Readings that failed to decode.
    pub decode_failures: u64,
    /// Reads or publishes that failed.
    pub read_failures: u64,
    /// Waits that failed.
    pub wait_failures: u64,
}

impl InterruptStats {
    /// Failures of any kind so far.
    pub fn failures(&self) -> u64 {
        self.decode_failures + self.read_failures + self.wait_failures
    }
}

/// Republishes the sensor reading on every interrupt.
pub struct InterruptSampler {
    path: PathBuf,
    data: File,
    buf: Vec<u8>,
    store: Arc<SharedStateStore>,
    stats: InterruptStats,
}

fn write_attribute(dir: &Path, name: &str, value: &str) -> Result<(), SamplerError> {
    let path = dir.join(name);
    OpenOptions::new()
        .write(true)
        .open(&path)
        .and_then(|mut file| file.write_all(value.as_bytes()))
        .map_err(|e| SamplerError::sensor_file(path, e))
}

impl InterruptSampler {
    /// Enable the sensor and its interrupt, open and prime the data file.
    ///
    /// The priming read is discarded.
    pub fn new(sensor_dir: &Path, store: Arc<SharedStateStore>) -> Result<Self, SamplerError> {
        write_attribute(sensor_dir, ENABLE_FILE, "1")?;
        write_attribute(sensor_dir, ENABLE_INTERRUPT_FILE, "1")?;

        let path = sensor_dir.join(DATA_FILE);
        let data = File::open(&path).map_err(|e| SamplerError::sensor_file(&path, e))?;
        let mut sampler = Self {
            path,
            data,
            buf: Vec::with_capacity(32),
            store,
            stats: InterruptStats::default(),
        };
        sampler.read_from_start()?;
        debug!("Interrupt sensor primed: {}", sampler.path.display());
        Ok(sampler)
    }

    /// Counters so far.
    pub fn stats(&self) -> InterruptStats {
        self.stats
    }

    fn read_from_start(&mut self) -> Result<(), SamplerError> {
        self.buf.clear();
        self.data
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.data.read_to_end(&mut self.buf))
            .map(|_| ())
            .map_err(|e| SamplerError::sensor_file(&self.path, e))
    }

    /// Handle one interrupt: re-read, decode and publish.
    ///
    /// Returns the published value, or `None` if the reading was skipped.
    pub fn on_wakeup(&mut self) -> Option<i32> {
        self.stats.wakeups += 1;
        if let Err(e) = self.read_from_start() {
            self.stats.read_failures += 1;
            if is_reported(self.stats.failures()) {
                warn!("Interrupt read skipped (#{}): {}", self.stats.failures(), e);
            }
            return None;
        }
        let value = match decode_reading(&self.buf) {
            Ok(value) => value,
            Err(e) => {
                self.stats.decode_failures += 1;
                if is_reported(self.stats.failures()) {
                    warn!("Interrupt reading dropped (#{}): {}", self.stats.failures(), e);
                }
                return None;
            }
        };
        if let Err(e) = self.store.write_interrupt_value(value) {
            self.stats.read_failures += 1;
            if is_reported(self.stats.failures()) {
                warn!("Interrupt publish failed (#{}): {}", self.stats.failures(), e);
            }
            return None;
        }
        self.stats.samples += 1;
        trace!("Interrupt sample {}", value);
        Some(value)
    }

    /// Wait for interrupts until shutdown is requested.
    pub fn run(mut self, shutdown: &ShutdownFlag, timeout: Duration) -> InterruptStats {
        info!("Interrupt sampler running on {}", self.path.display());
        let armed = PollFlags::POLLPRI | PollFlags::POLLERR;
        while shutdown.is_running() {
            let fired = {
                let mut fds = [PollFd::new(self.data.as_fd(), armed)];
                wait_ready(&mut fds, timeout).map(|ready| {
                    ready > 0 && fds[0].revents().is_some_and(|r| r.intersects(armed))
                })
            };
            match fired {
                Ok(true) => {
                    self.on_wakeup();
                }
                Ok(false) => {}
                Err(errno) => {
                    self.stats.wait_failures += 1;
                    if is_reported(self.stats.failures()) {
                        warn!(
                            "Interrupt wait failed (#{}): {}",
                            self.stats.failures(),
                            SamplerError::Wait(errno)
                        );
                    }
                }
            }
        }
        info!(
            "Interrupt sampler stopped: wakeups={}, samples={}, decode_failures={}, read_failures={}, wait_failures={}",
            self.stats.wakeups,
            self.stats.samples,
            self.stats.decode_failures,
            self.stats.read_failures,
            self.stats.wait_failures
        );
        self.stats
    }
}

/// Start the interrupt sampler worker thread.
///
/// A construction failure ends only this worker.
pub fn spawn_interrupt_sampler(
    config: InterruptConfig,
    store: Arc<SharedStateStore>,
    shutdown: ShutdownFlag,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("iomux-irq".to_string())
        .spawn(
            move || match InterruptSampler::new(&config.sensor_dir, store) {
                Ok(sampler) => {
                    sampler.run(&shutdown, config.wait_timeout());
                }
                Err(e) => error!("Interrupt sampler disabled: {}", e),
            },
        )
}
