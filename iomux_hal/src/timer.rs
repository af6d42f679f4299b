//! Periodic monotonic timer backed by `timerfd`.

use crate::error::SamplerError;
use crate::wait::wait_ready;
use nix::poll::{PollFd, PollFlags};
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::debug;

/// A repeating monotonic timer.
///
/// Each successful [`TimerSource::wait`] returns the number of expirations
/// since the previous read; more than one means ticks were missed.
#[derive(Debug)]
pub struct TimerSource {
    timer: TimerFd,
    period: Duration,
}

impl TimerSource {
    /// Create and arm a timer firing every `period`.
    pub fn new(period: Duration) -> Result<Self, SamplerError> {
        let timer = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_CLOEXEC)
            .map_err(SamplerError::Timer)?;
        timer
            .set(
                Expiration::Interval(TimeSpec::from_duration(period)),
                TimerSetTimeFlags::empty(),
            )
            .map_err(SamplerError::Timer)?;
        debug!("Timer armed, period={}us", period.as_micros());
        Ok(Self { timer, period })
    }

    /// Timer period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait at most `timeout` for the next expiration.
    ///
    /// Returns `None` on timeout, otherwise the expiration count (>= 1).
    pub fn wait(&self, timeout: Duration) -> Result<Option<u64>, SamplerError> {
        let mut fds = [PollFd::new(self.timer.as_fd(), PollFlags::POLLIN)];
        if wait_ready(&mut fds, timeout).map_err(SamplerError::Timer)? == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 8];
        match nix::unistd::read(self.timer.as_fd(), &mut buf) {
            Ok(8) => Ok(Some(u64::from_ne_bytes(buf))),
            Ok(_) => Ok(None),
            Err(nix::errno::Errno::EINTR | nix::errno::Errno::EAGAIN) => Ok(None),
            Err(errno) => Err(SamplerError::Timer(errno)),
        }
    }
}

/// Ticks lost when a read reports `expirations`.
#[inline]
pub fn missed_ticks(expirations: u64) -> u64 {
    expirations.saturating_sub(1)
}
