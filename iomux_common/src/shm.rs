//! Shared state naming and layout.
//!
//! - `consts`: word size and object name suffixes.
//! - `names`: per-instance segment and semaphore names.

pub mod consts;
pub mod names;
