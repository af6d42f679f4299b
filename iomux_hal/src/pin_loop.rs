//! Edge-driven pin mirroring loop.
//!
//! Waits for input edges, takes the level from the reported edge (or
//! re-reads inputs whose direction is unknown), drives each
//! output to its input (OR the requested-output overlay) and publishes the
//! composite mask once per change.

use crate::backends::PinBackend;
use crate::error::{MuxError, is_reported};
use crate::lifecycle::ShutdownFlag;
use iomux_common::consts::INPUT_PINS;
use iomux_common::mux::pins::PinMask;
use iomux_shared_memory::SharedStateStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pin loop counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PinLoopStats {
    /// Wakeups handled, idle or not.
    pub cycles: u64,
    /// Wakeups without an input edge.
    pub idle_wakeups: u64,
    /// Pin masks published.
    pub publishes: u64,
    /// Cycles skipped because of an I/O error.
    pub transient_errors: u64,
}

/// The main pin loop.
pub struct PinEventLoop {
    backend: Box<dyn PinBackend>,
    store: Arc<SharedStateStore>,
    timeout: Duration,
    inputs: PinMask,
    overlay: u32,
    current: PinMask,
    stats: PinLoopStats,
}

impl PinEventLoop {
    /// Build the loop over a requested backend and publish the initial state.
    pub fn new(
        backend: Box<dyn PinBackend>,
        store: Arc<SharedStateStore>,
        timeout: Duration,
    ) -> Result<Self, MuxError> {
        let mut pin_loop = Self {
            backend,
            store,
            timeout,
            inputs: PinMask::empty(),
            overlay: 0,
            current: PinMask::empty(),
            stats: PinLoopStats::default(),
        };
        if let Err(e) = pin_loop.prime() {
            let _ = pin_loop.backend.release();
            return Err(e);
        }
        Ok(pin_loop)
    }

    fn prime(&mut self) -> Result<(), MuxError> {
        let all: [usize; INPUT_PINS] = core::array::from_fn(|i| i);
        for sample in self.backend.read_levels(&all)? {
            self.inputs.set_input(sample.input, sample.level);
        }
        self.overlay = self.store.read_overlay();
        let composite = self.inputs.mirrored(self.overlay);
        self.backend.write_levels(composite.output_levels())?;
        if self.store.write_pin_mask(composite)? {
            self.stats.publishes += 1;
        }
        self.current = composite;
        info!("Pin loop primed: mask={:#04x}", composite.bits());
        Ok(())
    }

    /// Counters so far.
    pub fn stats(&self) -> PinLoopStats {
        self.stats
    }

    /// Last published composite mask.
    pub fn current_mask(&self) -> PinMask {
        self.current
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Handle one wakeup. Returns whether a new mask was published.
    ///
    /// A mask that failed to reach the outputs is retried on the next
    /// wakeup, idle or not.
    pub fn cycle(&mut self) -> Result<bool, MuxError> {
        self.stats.cycles += 1;
        let events = self.backend.wait_for_change(self.timeout)?;

        if events.is_empty() {
            self.stats.idle_wakeups += 1;
            self.store.attach_overlay();
            let overlay = self.store.read_overlay();
            if overlay != self.overlay {
                debug!("Overlay changed: {:#x} -> {:#x}", self.overlay, overlay);
                self.overlay = overlay;
            } else if self.inputs.mirrored(self.overlay) == self.current {
                return Ok(false);
            } else {
                debug!("Retrying output write for pending mask");
            }
        } else {
            let mut reread: heapless::Vec<usize, INPUT_PINS> = heapless::Vec::new();
            for event in &events {
                match event.edge {
                    Some(edge) => self.inputs.set_input(event.input, edge.level()),
                    None => {
                        let _ = reread.push(event.input);
                    }
                }
            }
            if !reread.is_empty() {
                for sample in self.backend.read_levels(&reread)? {
                    self.inputs.set_input(sample.input, sample.level);
                }
            }
            self.overlay = self.store.read_overlay();
        }

        self.apply()
    }

    fn apply(&mut self) -> Result<bool, MuxError> {
        let composite = self.inputs.mirrored(self.overlay);
        if composite == self.current {
            return Ok(false);
        }
        self.backend.write_levels(composite.output_levels())?;
        self.store.write_pin_mask(composite)?;
        self.current = composite;
        self.stats.publishes += 1;
        debug!("Pin mask published: {:#04x}", composite.bits());
        Ok(true)
    }

    /// Run until shutdown is requested. Errors skip the cycle.
    pub fn run(&mut self, shutdown: &ShutdownFlag) -> PinLoopStats {
        info!(
            "Pin loop running on {} backend (wait={}ms)",
            self.backend.name(),
            self.timeout.as_millis()
        );
        while shutdown.is_running() {
            if let Err(e) = self.cycle() {
                self.stats.transient_errors += 1;
                let n = self.stats.transient_errors;
                if is_reported(n) {
                    warn!("Pin cycle skipped (#{}): {}", n, e);
                }
            }
        }
        info!(
            "Pin loop stopped: cycles={}, idle={}, publishes={}, errors={}",
            self.stats.cycles,
            self.stats.idle_wakeups,
            self.stats.publishes,
            self.stats.transient_errors
        );
        self.stats
    }

    /// Release the pins and hand back the backend.
    pub fn into_backend(mut self) -> Box<dyn PinBackend> {
        if let Err(e) = self.backend.release() {
            warn!("Pin release failed: {}", e);
        }
        self.backend
    }
}
