//! Driver registry for resolving driver identifiers

use std::collections::HashMap;
use std::sync::Arc;

use crate::Driver;

/// Registry of available drivers
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register a driver under its own name, replacing any previous one
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        let name = driver.name().to_string();
        tracing::info!(driver = %name, "registering driver");
        self.drivers.insert(name, driver);
    }

    /// Builder form of `register`
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.register(driver);
        self
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        let driver = self.drivers.get(name).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectParams, PoolError, ResourceHandle, Result};

    struct NamedDriver(&'static str);

    impl Driver for NamedDriver {
        fn name(&self) -> &str {
            self.0
        }

        fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn ResourceHandle>> {
            Err(PoolError::Handle("not a real driver".into()))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = DriverRegistry::new()
            .with_driver(Arc::new(NamedDriver("sqlite")))
            .with_driver(Arc::new(NamedDriver("mock")));

        assert!(registry.has("sqlite"));
        assert!(registry.get("mock").is_some());
        assert!(registry.get("mysql").is_none());
        assert_eq!(registry.list(), vec!["mock", "sqlite"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(NamedDriver("sqlite")));
        registry.register(Arc::new(NamedDriver("sqlite")));
        assert_eq!(registry.list().len(), 1);
    }
}
