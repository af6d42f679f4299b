//! System-wide constants for the iomux workspace.
//!
//! Single source of truth for pin counts, default paths and cadences.
//! Imported by all crates.

/// Canonical service name (used for logging and as default name prefix).
pub const SERVICE_NAME: &str = "iomux";

/// Number of edge-triggered input pins.
pub const INPUT_PINS: usize = 4;

/// Number of mirrored output pins.
pub const OUTPUT_PINS: usize = 4;

/// Total number of logical pins (inputs first, then outputs).
pub const TOTAL_PINS: usize = INPUT_PINS + OUTPUT_PINS;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/iomux/iomux.toml";

/// Default bus sampling period in microseconds (1 Hz).
pub const DEFAULT_BUS_PERIOD_US: u64 = 1_000_000;

/// Default bounded wait used by the pin loop and the interrupt sampler, in ms.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 500;
