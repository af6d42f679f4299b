//! iomux Common Library
//!
//! This crate provides shared constants, the pin model and configuration
//! loading utilities for all iomux workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Pin counts, default paths and cadences
//! - [`config`] - Configuration loading traits and types
//! - [`mux`] - Multiplexer configuration and pin model
//! - [`shm`] - Shared state naming and layout constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use iomux_common::config::{ConfigLoader, SharedConfig};
//! use iomux_common::mux::pins::PinMask;
//! ```

pub mod config;
pub mod consts;
pub mod mux;
pub mod prelude;
pub mod shm;
