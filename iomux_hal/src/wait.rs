//! Bounded multiplexed waits shared by the pin loop and the samplers.

use nix::errno::Errno;
use nix::poll::{PollFd, PollTimeout, poll};
use std::time::Duration;

/// Convert a wait bound to a poll timeout, saturating at 65535 ms.
pub(crate) fn poll_timeout(timeout: Duration) -> PollTimeout {
    let ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    PollTimeout::from(ms)
}

/// `poll(2)` over `fds`. An interrupted wait counts as a timeout.
///
/// Returns the number of descriptors with non-zero `revents`.
pub(crate) fn wait_ready(fds: &mut [PollFd<'_>], timeout: Duration) -> Result<usize, Errno> {
    match poll(fds, poll_timeout(timeout)) {
        Ok(ready) => Ok(usize::try_from(ready).unwrap_or(0)),
        Err(Errno::EINTR) => Ok(0),
        Err(errno) => Err(errno),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_saturates() {
        assert_eq!(poll_timeout(Duration::from_secs(3600)), PollTimeout::from(u16::MAX));
        assert_eq!(poll_timeout(Duration::from_millis(500)), PollTimeout::from(500u16));
    }

    #[test]
    fn empty_wait_times_out() {
        let mut fds: [PollFd<'_>; 0] = [];
        assert_eq!(wait_ready(&mut fds, Duration::from_millis(1)).unwrap(), 0);
    }
}
