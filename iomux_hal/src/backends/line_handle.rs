//! Character-device backend (`/dev/gpiochipN`).
//!
//! Inputs are requested as individual edge-event handles (both edges),
//! outputs as one multi-line handle so all four are driven with a single
//! call.

use super::PinBackend;
use crate::error::PinError;
use crate::wait::wait_ready;
use gpio_cdev::{Chip, EventRequestFlags, EventType, LineEventHandle, LineRequestFlags, MultiLineHandle};
use iomux_common::consts::{INPUT_PINS, OUTPUT_PINS};
use iomux_common::mux::config::PinConfig;
use iomux_common::mux::pins::{Edge, PinEvent, PinEvents, PinSample, PinSamples, PinSet};
use nix::poll::{PollFd, PollFlags};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Line-request backend.
pub struct LineHandleBackend {
    chip: PathBuf,
    pins: PinSet,
    consumer: String,
    inputs: Vec<LineEventHandle>,
    outputs: Option<MultiLineHandle>,
}

impl LineHandleBackend {
    /// Backend for `pins` on the chip at `chip`.
    pub fn new(chip: impl Into<PathBuf>, pins: PinSet, consumer: impl Into<String>) -> Self {
        Self {
            chip: chip.into(),
            pins,
            consumer: consumer.into(),
            inputs: Vec::with_capacity(INPUT_PINS),
            outputs: None,
        }
    }

    fn line_error(&self, source: gpio_cdev::Error) -> PinError {
        PinError::Line {
            chip: self.chip.clone(),
            source,
        }
    }

    fn request_lines(&mut self) -> Result<(), PinError> {
        let mut chip = Chip::new(&self.chip).map_err(|e| self.line_error(e))?;
        for offset in self.pins.inputs {
            let handle = chip
                .get_line(offset)
                .and_then(|line| {
                    line.events(
                        LineRequestFlags::INPUT,
                        EventRequestFlags::BOTH_EDGES,
                        &self.consumer,
                    )
                })
                .map_err(|e| self.line_error(e))?;
            self.inputs.push(handle);
        }
        let outputs = chip
            .get_lines(&self.pins.outputs)
            .and_then(|lines| {
                lines.request(LineRequestFlags::OUTPUT, &[0; OUTPUT_PINS], &self.consumer)
            })
            .map_err(|e| self.line_error(e))?;
        self.outputs = Some(outputs);
        Ok(())
    }

    fn requested_inputs(&mut self) -> Result<&mut [LineEventHandle], PinError> {
        if self.inputs.len() == INPUT_PINS {
            Ok(&mut self.inputs)
        } else {
            Err(PinError::NotRequested("line_handle"))
        }
    }
}

impl PinBackend for LineHandleBackend {
    fn name(&self) -> &'static str {
        "line_handle"
    }

    fn request(&mut self) -> Result<(), PinError> {
        if let Err(e) = self.request_lines() {
            let _ = self.release();
            return Err(e);
        }
        info!(
            "Lines requested on {}: inputs={:?} outputs={:?}",
            self.chip.display(),
            self.pins.inputs,
            self.pins.outputs
        );
        Ok(())
    }

    fn wait_for_change(&mut self, timeout: Duration) -> Result<PinEvents, PinError> {
        let chip = self.chip.clone();
        let inputs = self.requested_inputs()?;
        let ready: heapless::Vec<bool, INPUT_PINS> = {
            // SAFETY: the descriptors belong to handles in `inputs`, which
            // outlive this block.
            let mut fds: heapless::Vec<PollFd<'_>, INPUT_PINS> = inputs
                .iter()
                .map(|h| {
                    let fd = unsafe { BorrowedFd::borrow_raw(h.as_raw_fd()) };
                    PollFd::new(fd, PollFlags::POLLIN)
                })
                .collect();
            if wait_ready(&mut fds, timeout)? == 0 {
                return Ok(PinEvents::new());
            }
            fds.iter()
                .map(|fd| fd.revents().is_some_and(|r| r.contains(PollFlags::POLLIN)))
                .collect()
        };

        let events = collect_events(&ready, |input| -> Result<Edge, gpio_cdev::Error> {
            let event = inputs[input].get_event()?;
            let edge = match event.event_type() {
                EventType::RisingEdge => Edge::Rising,
                EventType::FallingEdge => Edge::Falling,
            };
            trace!("Line event input={} {:?} ts={}", input, edge, event.timestamp());
            Ok(edge)
        });
        for event in events.iter().filter(|e| e.edge.is_none()) {
            debug!("Input {} on {} will be re-read", event.input, chip.display());
        }
        Ok(events)
    }

    fn read_levels(&mut self, inputs: &[usize]) -> Result<PinSamples, PinError> {
        let chip = self.chip.clone();
        let handles = self.requested_inputs()?;
        let mut samples = PinSamples::new();
        for &input in inputs.iter().take(INPUT_PINS) {
            let value = handles[input].get_value().map_err(|source| PinError::Line {
                chip: chip.clone(),
                source,
            })?;
            let _ = samples.push(PinSample {
                input,
                level: value != 0,
            });
        }
        Ok(samples)
    }

    fn write_levels(&mut self, levels: [bool; OUTPUT_PINS]) -> Result<(), PinError> {
        let outputs = self
            .outputs
            .as_ref()
            .ok_or(PinError::NotRequested("line_handle"))?;
        outputs
            .set_values(&levels.map(u8::from))
            .map_err(|e| self.line_error(e))
    }

    fn release(&mut self) -> Result<(), PinError> {
        if !self.inputs.is_empty() || self.outputs.is_some() {
            self.inputs.clear();
            self.outputs = None;
            debug!("Lines released on {}", self.chip.display());
        }
        Ok(())
    }
}

/// One event per ready input.
///
/// Events already taken from other handles must still reach the loop, so
/// a failed read only loses that input's direction: it is reported with
/// `edge: None` and re-read by the caller.
fn collect_events<E: std::fmt::Display>(
    ready: &[bool],
    mut read_edge: impl FnMut(usize) -> Result<Edge, E>,
) -> PinEvents {
    let mut events = PinEvents::new();
    for (input, _) in ready.iter().enumerate().filter(|(_, ready)| **ready) {
        let edge = match read_edge(input) {
            Ok(edge) => Some(edge),
            Err(e) => {
                warn!("Line event read failed on input {}: {}", input, e);
                None
            }
        };
        let _ = events.push(PinEvent { input, edge });
    }
    events
}

/// Factory for the backend registry.
pub fn create_backend(config: &PinConfig) -> Box<dyn PinBackend> {
    Box::new(LineHandleBackend::new(
        &config.chip,
        config.pin_set(),
        config.consumer.as_str(),
    ))
}
