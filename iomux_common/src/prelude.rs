//! Prelude module for common re-exports.
//!
//! ```rust
//! use iomux_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::mux::config::{
    BusConfig, InterruptConfig, MuxConfig, PinBackendKind, PinConfig, SharedStateConfig,
};

// ─── Pin Model ──────────────────────────────────────────────────────
pub use crate::consts::{INPUT_PINS, OUTPUT_PINS, TOTAL_PINS};
pub use crate::mux::pins::{Edge, PinEvent, PinEvents, PinMask, PinRole, PinSample, PinSamples, PinSet};

// ─── Shared State ───────────────────────────────────────────────────
pub use crate::shm::names::SegmentNames;

/// Default bus sampling period as Duration.
pub const DEFAULT_BUS_PERIOD: Duration = Duration::from_micros(crate::consts::DEFAULT_BUS_PERIOD_US);

/// Default bounded wait as Duration.
pub const DEFAULT_WAIT_TIMEOUT: Duration =
    Duration::from_millis(crate::consts::DEFAULT_WAIT_TIMEOUT_MS);
