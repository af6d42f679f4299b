//! Platform-specific shared memory primitives.

pub mod linux;
