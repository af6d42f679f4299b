//! # iomux Shared State
//!
//! Named POSIX shared memory words and the pin revision semaphore that the
//! iomux core publishes its state through.
//!
//! ## Layout
//!
//! ```text
//! /<prefix>_pins      u32  pin mask, bit i = logical pin i   (core writes)
//! /<prefix>_bus       i32  latest bus sample                 (core writes)
//! /<prefix>_irq       i32  latest interrupt sample           (core writes)
//! /<prefix>_cmd       u32  requested-output overlay          (consumer writes)
//! sem /<prefix>_pins_rev   posted once per pin mask change
//! ```
//!
//! Every segment is exactly one word. Readers see either the previous or
//! the new value of a word, never a mix.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iomux_common::shm::names::SegmentNames;
//! use iomux_shared_memory::{SharedStateStore, ShmResult};
//!
//! # fn main() -> ShmResult<()> {
//! let store = SharedStateStore::open_existing(&SegmentNames::new("iomux"))?;
//! while store.try_wait_revision()? {
//!     println!("pins: {:#04x}", store.read_pin_mask().bits());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **SharedStateStore**: `Sync`, shared behind an `Arc`, one writer per word
//! - **NamedSemaphore**: `Sync`, notification only, never a lock

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod segment;
pub mod semaphore;
pub mod store;

pub use error::{ShmError, ShmResult};
pub use segment::WordSegment;
pub use semaphore::NamedSemaphore;
pub use store::SharedStateStore;
