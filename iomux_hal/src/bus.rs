//! Periodic register bus sampler.
//!
//! Enables the bus sensor once, then on every timer tick selects the data
//! register, reads one byte and publishes it, sign-extended, into the
//! shared bus word.

use crate::error::{SamplerError, is_reported};
use crate::lifecycle::ShutdownFlag;
use crate::timer::{TimerSource, missed_ticks};
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use iomux_common::consts::DEFAULT_WAIT_TIMEOUT_MS;
use iomux_common::mux::config::BusConfig;
use iomux_shared_memory::SharedStateStore;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Register-level access to a single bus target.
pub trait RegisterBus: Send {
    /// Write `value` into `register`.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SamplerError>;

    /// Select `register` and read one byte from it.
    fn read_register(&mut self, register: u8) -> Result<u8, SamplerError>;
}

impl RegisterBus for LinuxI2CDevice {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SamplerError> {
        self.write(&[register, value])
            .map_err(|e| SamplerError::Bus {
                operation: "write",
                message: e.to_string(),
            })
    }

    fn read_register(&mut self, register: u8) -> Result<u8, SamplerError> {
        self.write(&[register]).map_err(|e| SamplerError::Bus {
            operation: "select",
            message: e.to_string(),
        })?;
        let mut buf = [0u8; 1];
        self.read(&mut buf).map_err(|e| SamplerError::Bus {
            operation: "read",
            message: e.to_string(),
        })?;
        Ok(buf[0])
    }
}

/// Open the bus device at the configured address.
pub fn open_bus(config: &BusConfig) -> Result<LinuxI2CDevice, SamplerError> {
    LinuxI2CDevice::new(&config.device, config.address).map_err(|e| SamplerError::Bus {
        operation: "open",
        message: format!("{}: {}", config.device.display(), e),
    })
}

/// Interpret a raw register byte as a two's-complement sample.
#[inline]
pub fn decode_sample(raw: u8) -> i32 {
    i32::from(raw as i8)
}

/// Bus sampler counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Samples published.
    pub samples: u64,
    /// Reads that failed and were skipped.
    pub read_failures: u64,
    /// Timer periods that elapsed without a sample.
    pub missed_ticks: u64,
    /// Timer waits that failed.
    pub timer_failures: u64,
}

/// Samples one register per tick and publishes it.
pub struct BusSampler<B: RegisterBus> {
    bus: B,
    data_register: u8,
    store: Arc<SharedStateStore>,
    stats: BusStats,
}

impl<B: RegisterBus> BusSampler<B> {
    /// Enable the sensor and build the sampler.
    pub fn new(
        mut bus: B,
        config: &BusConfig,
        store: Arc<SharedStateStore>,
    ) -> Result<Self, SamplerError> {
        bus.write_register(config.enable_register, config.enable_value)?;
        debug!(
            "Bus sensor enabled: reg {:#04x} <- {:#04x}",
            config.enable_register, config.enable_value
        );
        Ok(Self {
            bus,
            data_register: config.data_register,
            store,
            stats: BusStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    /// Handle one timer read reporting `expirations`.
    ///
    /// Always samples once; extra expirations are counted as missed.
    pub fn on_tick(&mut self, expirations: u64) {
        let missed = missed_ticks(expirations);
        if missed > 0 {
            self.stats.missed_ticks += missed;
            debug!("Bus sampler missed {} tick(s)", missed);
        }

        let result = self
            .bus
            .read_register(self.data_register)
            .map(decode_sample)
            .and_then(|value| {
                self.store.write_bus_value(value)?;
                Ok(value)
            });
        match result {
            Ok(value) => {
                self.stats.samples += 1;
                trace!("Bus sample {}", value);
            }
            Err(e) => {
                self.stats.read_failures += 1;
                let n = self.stats.read_failures;
                if is_reported(n) {
                    warn!("Bus sample skipped (#{}): {}", n, e);
                }
            }
        }
    }

    /// Handle the outcome of one bounded timer wait.
    pub fn on_wait(&mut self, waited: Result<Option<u64>, SamplerError>) {
        match waited {
            Ok(Some(expirations)) => self.on_tick(expirations),
            Ok(None) => {}
            Err(e) => {
                self.stats.timer_failures += 1;
                let n = self.stats.timer_failures;
                if is_reported(n) {
                    warn!("Bus timer wait failed (#{}): {}", n, e);
                }
            }
        }
    }

    /// Sample on every tick of `timer` until shutdown is requested.
    pub fn run(mut self, timer: &TimerSource, shutdown: &ShutdownFlag) -> BusStats {
        let wait = Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS);
        info!(
            "Bus sampler running (period={}us)",
            timer.period().as_micros()
        );
        while shutdown.is_running() {
            self.on_wait(timer.wait(wait));
        }
        info!(
            "Bus sampler stopped: samples={}, read_failures={}, missed_ticks={}, timer_failures={}",
            self.stats.samples,
            self.stats.read_failures,
            self.stats.missed_ticks,
            self.stats.timer_failures
        );
        self.stats
    }
}

/// Start the bus sampler worker thread.
///
/// Device and timer are opened inside the worker. A failure there ends
/// only this worker; the rest of the process keeps running.
pub fn spawn_bus_sampler(
    config: BusConfig,
    store: Arc<SharedStateStore>,
    shutdown: ShutdownFlag,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("iomux-bus".to_string())
        .spawn(move || {
            let started = open_bus(&config)
                .and_then(|bus| BusSampler::new(bus, &config, store))
                .and_then(|sampler| Ok((sampler, TimerSource::new(config.period())?)));
            match started {
                Ok((sampler, timer)) => {
                    sampler.run(&timer, &shutdown);
                }
                Err(e) => error!("Bus sampler disabled: {}", e),
            }
        })
}
