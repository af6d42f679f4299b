//! Multiplexer configuration types.
//!
//! - `MuxConfig` - Main configuration loaded from iomux.toml
//! - `PinConfig` - Pin backend selection and pin layout
//! - `BusConfig` - Register bus sampler
//! - `InterruptConfig` - Interrupt-driven sensor sampler
//! - `SharedStateConfig` - Shared memory naming

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{DEFAULT_BUS_PERIOD_US, DEFAULT_WAIT_TIMEOUT_MS, SERVICE_NAME};
use crate::mux::pins::PinSet;
use crate::shm::names::SegmentNames;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_shared() -> SharedConfig {
    SharedConfig {
        log_level: Default::default(),
        service_name: SERVICE_NAME.to_string(),
    }
}

fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// Main configuration loaded from `iomux.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MuxConfig {
    /// Logging and instance name.
    #[serde(default = "default_shared")]
    pub shared: SharedConfig,

    /// Pin backend and layout.
    #[serde(default)]
    pub pins: PinConfig,

    /// Periodic register bus sampler.
    #[serde(default)]
    pub bus: BusConfig,

    /// Interrupt-driven sensor sampler.
    #[serde(default)]
    pub interrupt: InterruptConfig,

    /// Shared memory naming.
    #[serde(default)]
    pub shared_state: SharedStateConfig,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            shared: default_shared(),
            pins: PinConfig::default(),
            bus: BusConfig::default(),
            interrupt: InterruptConfig::default(),
            shared_state: SharedStateConfig::default(),
        }
    }
}

impl MuxConfig {
    /// Validate the whole configuration.
    ///
    /// # Validation Rules
    /// 1. `[shared]` is valid
    /// 2. The 8 pin offsets are distinct
    /// 3. Wait timeouts are in 1..=65535 ms
    /// 4. Bus period is non-zero and the address is 7-bit
    /// 5. The shared-state prefix is a valid object name
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.pins.validate()?;
        self.bus.validate()?;
        self.interrupt.validate()?;
        self.shared_state.validate()?;
        Ok(())
    }
}

/// Pin addressing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PinBackendKind {
    /// Batched line-request interface (`/dev/gpiochipN`).
    #[default]
    LineHandle,
    /// Legacy file-per-pin interface (`/sys/class/gpio`).
    ValueFile,
    /// In-process simulation, no hardware.
    Simulation,
}

impl PinBackendKind {
    /// Registry name of the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LineHandle => "line_handle",
            Self::ValueFile => "value_file",
            Self::Simulation => "simulation",
        }
    }
}

/// Pin backend selection and pin layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// Backend used to request and drive the pins.
    #[serde(default)]
    pub backend: PinBackendKind,

    /// Input offsets (logical pins 0-3).
    #[serde(default = "default_inputs")]
    pub inputs: [u32; 4],

    /// Output offsets (logical pins 4-7).
    #[serde(default = "default_outputs")]
    pub outputs: [u32; 4],

    /// Character device of the GPIO chip (line-handle backend).
    #[serde(default = "default_chip")]
    pub chip: PathBuf,

    /// Root of the legacy GPIO class directory (value-file backend).
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Global GPIO number of offset 0 (value-file backend).
    #[serde(default = "default_pin_base")]
    pub pin_base: u32,

    /// Consumer label attached to requested lines.
    #[serde(default = "default_consumer")]
    pub consumer: String,

    /// Bounded wait between liveness checks, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_inputs() -> [u32; 4] {
    PinSet::default().inputs
}

fn default_outputs() -> [u32; 4] {
    PinSet::default().outputs
}

fn default_chip() -> PathBuf {
    PathBuf::from("/dev/gpiochip4")
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_pin_base() -> u32 {
    2027
}

fn default_consumer() -> String {
    SERVICE_NAME.to_string()
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            backend: PinBackendKind::default(),
            inputs: default_inputs(),
            outputs: default_outputs(),
            chip: default_chip(),
            sysfs_root: default_sysfs_root(),
            pin_base: default_pin_base(),
            consumer: default_consumer(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl PinConfig {
    /// Pin layout described by this section.
    pub fn pin_set(&self) -> PinSet {
        PinSet {
            inputs: self.inputs,
            outputs: self.outputs,
        }
    }

    /// Bounded wait between liveness checks.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.pin_set().is_distinct() {
            return Err(ConfigError::ValidationError(format!(
                "pin offsets must be distinct: inputs={:?} outputs={:?}",
                self.inputs, self.outputs
            )));
        }
        if self.consumer.is_empty() {
            return Err(ConfigError::ValidationError(
                "pins.consumer cannot be empty".to_string(),
            ));
        }
        validate_timeout("pins.wait_timeout_ms", self.wait_timeout_ms)
    }
}

/// Periodic register bus sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Start the sampler worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bus character device.
    #[serde(default = "default_bus_device")]
    pub device: PathBuf,

    /// 7-bit target address.
    #[serde(default = "default_bus_address")]
    pub address: u16,

    /// Register written once at startup to enable the device.
    #[serde(default = "default_enable_register")]
    pub enable_register: u8,

    /// Value written to `enable_register`.
    #[serde(default = "default_enable_value")]
    pub enable_value: u8,

    /// Register selected before every sample read.
    #[serde(default = "default_data_register")]
    pub data_register: u8,

    /// Sampling period in microseconds.
    #[serde(default = "default_period_us")]
    pub period_us: u64,
}

fn default_bus_device() -> PathBuf {
    PathBuf::from("/dev/i2c-1")
}

fn default_bus_address() -> u16 {
    0x18
}

fn default_enable_register() -> u8 {
    0x20
}

fn default_enable_value() -> u8 {
    0x47
}

fn default_data_register() -> u8 {
    0x29
}

fn default_period_us() -> u64 {
    DEFAULT_BUS_PERIOD_US
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: default_bus_device(),
            address: default_bus_address(),
            enable_register: default_enable_register(),
            enable_value: default_enable_value(),
            data_register: default_data_register(),
            period_us: default_period_us(),
        }
    }
}

impl BusConfig {
    /// Sampling period.
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_us == 0 {
            return Err(ConfigError::ValidationError(
                "bus.period_us must be greater than 0".to_string(),
            ));
        }
        if self.address > 0x7F {
            return Err(ConfigError::ValidationError(format!(
                "bus.address {:#x} is not a 7-bit address",
                self.address
            )));
        }
        Ok(())
    }
}

/// Interrupt-driven sensor sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterruptConfig {
    /// Start the sampler worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Driver attribute directory holding `enable`, `enable_interrupt`
    /// and `data`.
    #[serde(default = "default_sensor_dir")]
    pub sensor_dir: PathBuf,

    /// Bounded wait between liveness checks, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_sensor_dir() -> PathBuf {
    PathBuf::from("/sys/class/iomux/sensor")
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensor_dir: default_sensor_dir(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl InterruptConfig {
    /// Bounded wait between liveness checks.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("interrupt.wait_timeout_ms", self.wait_timeout_ms)
    }
}

/// Shared memory naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedStateConfig {
    /// Prefix of every segment and semaphore name.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    SERVICE_NAME.to_string()
}

impl Default for SharedStateConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

impl SharedStateConfig {
    /// Object names derived from the prefix.
    pub fn names(&self) -> SegmentNames {
        SegmentNames::new(&self.prefix)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        SegmentNames::validate_prefix(&self.prefix)
            .map_err(|reason| ConfigError::ValidationError(format!("shared_state.prefix: {reason}")))
    }
}

fn validate_timeout(field: &str, value_ms: u64) -> Result<(), ConfigError> {
    if value_ms == 0 || value_ms > u64::from(u16::MAX) {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be in 1..={} (got {value_ms})",
            u16::MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    #[test]
    fn empty_file_uses_defaults() {
        let config = MuxConfig::parse("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.shared.service_name, SERVICE_NAME);
        assert_eq!(config.pins.backend, PinBackendKind::LineHandle);
        assert_eq!(config.pins.pin_set(), PinSet::default());
        assert_eq!(config.bus.period(), Duration::from_secs(1));
        assert_eq!(config.shared_state.prefix, "iomux");
    }

    #[test]
    fn backend_names_round_trip_through_serde() {
        for kind in [
            PinBackendKind::LineHandle,
            PinBackendKind::ValueFile,
            PinBackendKind::Simulation,
        ] {
            let text = format!("[pins]\nbackend = \"{}\"\n", kind.as_str());
            assert_eq!(MuxConfig::parse(&text).unwrap().pins.backend, kind);
        }
    }

    #[test]
    fn duplicate_offsets_rejected() {
        let config = MuxConfig::parse("[pins]\ninputs = [0, 1, 2, 3]\noutputs = [0, 5, 6, 7]\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_period_rejected() {
        let config = MuxConfig::parse("[bus]\nperiod_us = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn wide_bus_address_rejected() {
        let config = MuxConfig::parse("[bus]\naddress = 0x80\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_timeout_rejected() {
        let config = MuxConfig::parse("[interrupt]\nwait_timeout_ms = 70000\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_prefix_rejected() {
        let config = MuxConfig::parse("[shared_state]\nprefix = \"a/b\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(MuxConfig::parse("[axes]\ncount = 3\n").is_err());
    }
}
