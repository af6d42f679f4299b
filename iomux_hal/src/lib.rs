//! # iomux HAL Library
//!
//! Edge-driven pin mirroring plus two sensor samplers, all publishing into
//! the shared state store.
//!
//! # Module Structure
//!
//! - [`lifecycle`] - LifecycleController, startup/shutdown ordering
//! - [`pin_loop`] - PinEventLoop, input-to-output mirroring
//! - [`backends`] - PinBackend trait and implementations
//! - [`backend_registry`] - Backend factory registration
//! - [`bus`] - Periodic register bus sampler
//! - [`interrupt`] - Interrupt-driven sensor sampler
//! - [`timer`] - Monotonic periodic timer
//! - [`error`] - Error types and exit codes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         iomux_hal                                │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ PinEventLoop │   │  BusSampler  │   │  InterruptSampler    │  │
//! │  │ (main thread)│   │ (timer tick) │   │  (POLLPRI wakeup)    │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘  │
//! │         │ pins             │ bus                  │ irq          │
//! │         ▼                  ▼                      ▼              │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │       SharedStateStore (iomux_shared_memory)               │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod backend_registry;
pub mod backends;
pub mod bus;
pub mod error;
pub mod interrupt;
pub mod lifecycle;
pub mod pin_loop;
pub mod timer;
mod wait;

// Re-export key types for convenience
pub use crate::backend_registry::BackendRegistry;
pub use crate::backends::PinBackend;
pub use crate::error::MuxError;
pub use crate::lifecycle::{LifecycleController, LifecycleState, ShutdownFlag};
pub use crate::pin_loop::PinEventLoop;
