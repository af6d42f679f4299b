//! Registry of pin backends.
//!
//! Provides a `BackendRegistry` mapping backend names to factory functions.
//! Constructed at startup and handed to the lifecycle controller by value,
//! so tests can register their own backends.

use crate::backends::{PinBackend, line_handle, simulation, value_file};
use crate::error::PinError;
use iomux_common::mux::config::{PinBackendKind, PinConfig};
use std::collections::HashMap;

/// Factory function creating an unrequested backend from its config.
pub type BackendFactory = fn(&PinConfig) -> Box<dyn PinBackend>;

/// Registry of available pin backends.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (kind, factory) in [
            (PinBackendKind::LineHandle, line_handle::create_backend as BackendFactory),
            (PinBackendKind::ValueFile, value_file::create_backend),
            (PinBackendKind::Simulation, simulation::create_backend),
        ] {
            registry.factories.insert(kind.as_str(), factory);
        }
        registry
    }

    /// Register a backend factory.
    ///
    /// # Errors
    /// Returns `PinError::DuplicateBackend` if the name is taken.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) -> Result<(), PinError> {
        if self.factories.contains_key(name) {
            return Err(PinError::DuplicateBackend(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a backend factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BackendFactory> {
        self.factories.get(name).copied()
    }

    /// Create the backend selected by `config`.
    ///
    /// # Errors
    /// Returns `PinError::UnknownBackend` if nothing is registered under
    /// the configured name.
    pub fn create_backend(&self, config: &PinConfig) -> Result<Box<dyn PinBackend>, PinError> {
        let name = config.backend.as_str();
        let factory = self
            .get_factory(name)
            .ok_or_else(|| PinError::UnknownBackend(name.to_string()))?;
        Ok(factory(config))
    }

    /// All registered backend names, sorted.
    pub fn list_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulation::SimulationBackend;

    fn create_test_backend(_config: &PinConfig) -> Box<dyn PinBackend> {
        Box::new(SimulationBackend::new())
    }

    #[test]
    fn builtin_backends_registered() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(
            registry.list_backends(),
            vec!["line_handle", "simulation", "value_file"]
        );
    }

    #[test]
    fn creates_configured_backend() {
        let registry = BackendRegistry::with_builtin();
        let config = PinConfig {
            backend: PinBackendKind::ValueFile,
            ..PinConfig::default()
        };
        let backend = registry.create_backend(&config).unwrap();
        assert_eq!(backend.name(), "value_file");
    }

    #[test]
    fn missing_backend_is_reported() {
        let registry = BackendRegistry::new();
        let result = registry.create_backend(&PinConfig::default());
        assert!(matches!(result, Err(PinError::UnknownBackend(name)) if name == "line_handle"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = BackendRegistry::new();
        registry.register("test", create_test_backend).unwrap();
        assert!(matches!(
            registry.register("test", create_test_backend),
            Err(PinError::DuplicateBackend("test"))
        ));
        assert!(registry.get_factory("test").is_some());
    }
}
