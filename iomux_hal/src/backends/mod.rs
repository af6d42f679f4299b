//! Pin backend implementations.
//!
//! - [`line_handle`] - batched line requests on a GPIO character device
//! - [`value_file`] - legacy file-per-pin class interface
//! - [`simulation`] - in-process pins for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `backends/`
//! 2. Implement [`PinBackend`]
//! 3. Register a factory in [`crate::backend_registry::BackendRegistry::with_builtin`]

pub mod line_handle;
pub mod simulation;
pub mod value_file;

use crate::error::PinError;
use iomux_common::consts::OUTPUT_PINS;
use iomux_common::mux::pins::{PinEvents, PinSamples};
use std::time::Duration;

/// One way of addressing the 8 multiplexer pins.
///
/// # Lifecycle
///
/// 1. `request()` - acquire all pins, inputs edge-armed, outputs low
/// 2. `wait_for_change()` / `read_levels()` / `write_levels()` - steady state
/// 3. `release()` - give every pin back
///
/// Input indices are logical (0-3); the backend maps them to its offsets.
pub trait PinBackend: Send {
    /// Registry name of the backend.
    fn name(&self) -> &'static str;

    /// Acquire and configure all pins.
    fn request(&mut self) -> Result<(), PinError>;

    /// Block up to `timeout` for input edges.
    ///
    /// Returns an empty set on timeout or interruption.
    fn wait_for_change(&mut self, timeout: Duration) -> Result<PinEvents, PinError>;

    /// Read the current level of each listed input.
    fn read_levels(&mut self, inputs: &[usize]) -> Result<PinSamples, PinError>;

    /// Drive all outputs.
    fn write_levels(&mut self, levels: [bool; OUTPUT_PINS]) -> Result<(), PinError>;

    /// Release every pin. Safe to call more than once.
    fn release(&mut self) -> Result<(), PinError>;
}
