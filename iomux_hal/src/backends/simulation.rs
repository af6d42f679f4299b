//! Simulation pin backend.
//!
//! Inputs are driven through a [`SimulationHandle`]; outputs are latched
//! and observable through the same handle. No hardware is touched.

use super::PinBackend;
use crate::error::PinError;
use iomux_common::consts::{INPUT_PINS, OUTPUT_PINS};
use iomux_common::mux::config::PinConfig;
use iomux_common::mux::pins::{Edge, PinEvent, PinEvents, PinSample, PinSamples};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, trace};

/// Pin state shared between the backend and its handles.
#[derive(Debug, Default)]
struct SimulatedPins {
    inputs: Mutex<[bool; INPUT_PINS]>,
    outputs: Mutex<[bool; OUTPUT_PINS]>,
    requested: AtomicBool,
    output_writes: AtomicU64,
}

/// Injection and observation handle for a [`SimulationBackend`].
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    pins: Arc<SimulatedPins>,
    edges: Sender<PinEvent>,
}

impl SimulationHandle {
    /// Drive an input. An edge is queued only if the level changes.
    pub fn set_input(&self, input: usize, level: bool) {
        let changed = {
            let mut inputs = self.pins.inputs.lock();
            let changed = inputs[input] != level;
            inputs[input] = level;
            changed
        };
        if changed {
            trace!("Simulated input {} -> {}", input, level);
            let _ = self.edges.send(PinEvent {
                input,
                edge: Some(Edge::from_level(level)),
            });
        }
    }

    /// Current input levels.
    pub fn inputs(&self) -> [bool; INPUT_PINS] {
        *self.pins.inputs.lock()
    }

    /// Latched output levels.
    pub fn outputs(&self) -> [bool; OUTPUT_PINS] {
        *self.pins.outputs.lock()
    }

    /// Number of `write_levels()` calls so far.
    pub fn output_writes(&self) -> u64 {
        self.pins.output_writes.load(Ordering::Acquire)
    }

    /// Whether the pins are currently requested.
    pub fn is_requested(&self) -> bool {
        self.pins.requested.load(Ordering::Acquire)
    }
}

/// In-process pin backend.
pub struct SimulationBackend {
    pins: Arc<SimulatedPins>,
    edges: Receiver<PinEvent>,
    handle: SimulationHandle,
}

impl SimulationBackend {
    /// Create a backend with all pins low.
    pub fn new() -> Self {
        let pins = Arc::new(SimulatedPins::default());
        let (tx, rx) = mpsc::channel();
        Self {
            handle: SimulationHandle {
                pins: Arc::clone(&pins),
                edges: tx,
            },
            pins,
            edges: rx,
        }
    }

    /// Handle for driving inputs and observing outputs.
    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    fn ensure_requested(&self) -> Result<(), PinError> {
        if self.pins.requested.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(PinError::NotRequested(self.name()))
        }
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PinBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn request(&mut self) -> Result<(), PinError> {
        *self.pins.outputs.lock() = [false; OUTPUT_PINS];
        self.pins.requested.store(true, Ordering::Release);
        debug!("Simulation pins requested");
        Ok(())
    }

    fn wait_for_change(&mut self, timeout: Duration) -> Result<PinEvents, PinError> {
        self.ensure_requested()?;
        let mut events = PinEvents::new();
        let first = match self.edges.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return Ok(events),
        };
        // Coalesce everything already queued, one event per input.
        for event in std::iter::once(first).chain(self.edges.try_iter()) {
            match events.iter_mut().find(|e| e.input == event.input) {
                Some(existing) => existing.edge = event.edge,
                None => {
                    let _ = events.push(event);
                }
            }
        }
        Ok(events)
    }

    fn read_levels(&mut self, inputs: &[usize]) -> Result<PinSamples, PinError> {
        self.ensure_requested()?;
        let levels = *self.pins.inputs.lock();
        Ok(inputs
            .iter()
            .take(INPUT_PINS)
            .map(|&input| PinSample {
                input,
                level: levels[input],
            })
            .collect())
    }

    fn write_levels(&mut self, levels: [bool; OUTPUT_PINS]) -> Result<(), PinError> {
        self.ensure_requested()?;
        *self.pins.outputs.lock() = levels;
        self.pins.output_writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release(&mut self) -> Result<(), PinError> {
        if self.pins.requested.swap(false, Ordering::AcqRel) {
            debug!("Simulation pins released");
        }
        Ok(())
    }
}

/// Factory for the backend registry.
pub fn create_backend(_config: &PinConfig) -> Box<dyn PinBackend> {
    Box::new(SimulationBackend::new())
}
