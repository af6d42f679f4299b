//! Process lifecycle: startup, steady state and orderly shutdown.
//!
//! ```text
//! STARTING ──► RUNNING ──► SHUTTING_DOWN ──► TERMINATED
//!    │                          ▲
//!    └──── startup failure ─────┘
//! ```
//!
//! Startup attaches the shared state store, starts the sampler workers,
//! then requests the pins. Any failure releases what was already acquired.

use crate::backend_registry::BackendRegistry;
use crate::backends::PinBackend;
use crate::bus::spawn_bus_sampler;
use crate::error::MuxError;
use crate::interrupt::spawn_interrupt_sampler;
use crate::pin_loop::{PinEventLoop, PinLoopStats};
use iomux_common::mux::config::MuxConfig;
use iomux_shared_memory::SharedStateStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// Cooperative shutdown signal shared by every worker.
///
/// Starts in the running state; [`ShutdownFlag::request_shutdown`] is
/// async-signal-safe.
#[derive(Debug, Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// New flag in the running state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Whether workers should keep going.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Ask every worker to stop.
    pub fn request_shutdown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Acquiring resources.
    Starting,
    /// Pin loop active.
    Running,
    /// Releasing resources.
    ShuttingDown,
    /// Everything released.
    Terminated,
}

/// Owns every resource of the multiplexer process.
pub struct LifecycleController {
    config: MuxConfig,
    registry: BackendRegistry,
    backend_override: Option<Box<dyn PinBackend>>,
    state: LifecycleState,
    shutdown: ShutdownFlag,
    store: Option<Arc<SharedStateStore>>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
    pin_loop: Option<PinEventLoop>,
    stats: PinLoopStats,
}

impl LifecycleController {
    /// Create a controller for a validated configuration.
    pub fn new(config: MuxConfig, registry: BackendRegistry) -> Result<Self, MuxError> {
        config.validate()?;
        info!(
            "Lifecycle controller created: service={}, backend={}",
            config.shared.service_name,
            config.pins.backend.as_str()
        );
        Ok(Self {
            config,
            registry,
            backend_override: None,
            state: LifecycleState::Starting,
            shutdown: ShutdownFlag::new(),
            store: None,
            workers: Vec::new(),
            pin_loop: None,
            stats: PinLoopStats::default(),
        })
    }

    /// Use `backend` instead of the one the registry would create.
    pub fn with_backend(mut self, backend: Box<dyn PinBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    /// Flag to hand to a signal handler.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Pin loop counters (final once terminated).
    pub fn stats(&self) -> PinLoopStats {
        self.pin_loop.as_ref().map_or(self.stats, PinEventLoop::stats)
    }

    /// The attached store, while running.
    pub fn store(&self) -> Option<&Arc<SharedStateStore>> {
        self.store.as_ref()
    }

    /// STARTING: acquire everything.
    ///
    /// # Errors
    /// Any acquisition failure. Resources acquired so far are released and
    /// the controller ends in `Terminated`.
    pub fn start(&mut self) -> Result<(), MuxError> {
        if self.state != LifecycleState::Starting {
            return Err(MuxError::InvalidState(format!("start from {:?}", self.state)));
        }
        info!("iomux starting...");
        match self.acquire() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                info!("iomux running");
                Ok(())
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                if let Err(cleanup) = self.shutdown() {
                    warn!("Cleanup after failed startup: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn acquire(&mut self) -> Result<(), MuxError> {
        let names = self.config.shared_state.names();
        let store = Arc::new(SharedStateStore::attach(&names)?);
        self.store = Some(Arc::clone(&store));

        if self.config.bus.enabled {
            let handle = spawn_bus_sampler(
                self.config.bus.clone(),
                Arc::clone(&store),
                self.shutdown.clone(),
            )
            .map_err(|source| MuxError::Spawn { name: "bus", source })?;
            self.workers.push(("bus", handle));
        }
        if self.config.interrupt.enabled {
            let handle = spawn_interrupt_sampler(
                self.config.interrupt.clone(),
                Arc::clone(&store),
                self.shutdown.clone(),
            )
            .map_err(|source| MuxError::Spawn {
                name: "interrupt",
                source,
            })?;
            self.workers.push(("interrupt", handle));
        }

        let mut backend = match self.backend_override.take() {
            Some(backend) => backend,
            None => self.registry.create_backend(&self.config.pins)?,
        };
        backend.request()?;
        let pin_loop = PinEventLoop::new(backend, store, self.config.pins.wait_timeout())?;
        self.pin_loop = Some(pin_loop);
        Ok(())
    }

    /// RUNNING: drive the pin loop until shutdown is requested.
    pub fn run(&mut self) -> Result<PinLoopStats, MuxError> {
        if self.state != LifecycleState::Running {
            return Err(MuxError::InvalidState(format!("run from {:?}", self.state)));
        }
        let pin_loop = self
            .pin_loop
            .as_mut()
            .ok_or_else(|| MuxError::InvalidState("run without pins".to_string()))?;
        Ok(pin_loop.run(&self.shutdown))
    }

    /// SHUTTING_DOWN: release pins, stop and join workers, unlink shared
    /// state. Ends in `Terminated`. Idempotent.
    pub fn shutdown(&mut self) -> Result<(), MuxError> {
        if self.state == LifecycleState::Terminated {
            return Ok(());
        }
        self.state = LifecycleState::ShuttingDown;
        info!("iomux shutting down...");
        self.shutdown.request_shutdown();

        if let Some(pin_loop) = self.pin_loop.take() {
            self.stats = pin_loop.stats();
            drop(pin_loop.into_backend());
        }

        for (name, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker {} panicked", name);
            }
        }

        let result = match self.store.take() {
            Some(store) => match Arc::try_unwrap(store) {
                Ok(store) => store.detach_and_unlink(),
                Err(shared) => {
                    warn!("Shared state still referenced; unlinking names only");
                    let names = shared.names().clone();
                    drop(shared);
                    SharedStateStore::unlink_names(&names)
                }
            },
            None => Ok(()),
        };

        self.state = LifecycleState::Terminated;
        info!(
            "iomux terminated: cycles={}, publishes={}, transient_errors={}",
            self.stats.cycles, self.stats.publishes, self.stats.transient_errors
        );
        result.map_err(MuxError::from)
    }

    /// Start, run until shutdown is requested, then shut down.
    pub fn execute(&mut self) -> Result<(), MuxError> {
        self.start()?;
        let run_result = self.run().map(|_| ());
        let shutdown_result = self.shutdown();
        run_result.and(shutdown_result)
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.state != LifecycleState::Terminated {
            if let Err(e) = self.shutdown() {
                warn!("Shutdown on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_is_shared() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(flag.is_running());
        clone.request_shutdown();
        assert!(!flag.is_running());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = MuxConfig::default();
        config.bus.period_us = 0;
        assert!(matches!(
            LifecycleController::new(config, BackendRegistry::with_builtin()),
            Err(MuxError::Config(_))
        ));
    }

    #[test]
    fn run_before_start_is_rejected() {
        let mut config = MuxConfig::default();
        config.shared_state.prefix = format!("iomux_lc_{}_early", std::process::id());
        let mut controller =
            LifecycleController::new(config, BackendRegistry::with_builtin()).unwrap();
        assert!(matches!(controller.run(), Err(MuxError::InvalidState(_))));
        controller.shutdown().unwrap();
        assert_eq!(controller.state(), LifecycleState::Terminated);
    }
}
