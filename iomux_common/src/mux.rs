//! Multiplexer configuration and pin model.
//!
//! This module contains the types shared by the pin loop, the samplers and
//! any consumer of the shared state:
//! - `config`: `MuxConfig` and its sections, loaded from the TOML file.
//! - `pins`: pin mask, pin set layout and edge events.

pub mod config;
pub mod pins;
