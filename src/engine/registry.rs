//! Driver Registry
//!
//! Central registry of available database drivers, keyed by driver id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::drivers::mysql::MySqlDriver;
use crate::engine::drivers::postgres::PostgresDriver;
use crate::engine::drivers::sqlite::SqliteDriver;
use crate::engine::traits::DataEngine;

/// Registry that holds all available database drivers.
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DataEngine>>,
}

impl DriverRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in SQL drivers registered.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlDriver::new()));
        registry.register(Arc::new(PostgresDriver::new()));
        registry.register(Arc::new(SqliteDriver::new()));
        registry
    }

    /// Registers a driver under its `driver_id()`.
    pub fn register(&mut self, driver: Arc<dyn DataEngine>) {
        let id = driver.driver_id().to_string();
        self.drivers.insert(id, driver);
    }

    /// Gets a driver by its id.
    pub fn get(&self, driver_id: &str) -> Option<Arc<dyn DataEngine>> {
        self.drivers.get(driver_id).cloned()
    }

    /// Lists all registered driver ids.
    pub fn list(&self) -> Vec<&str> {
        self.drivers.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin_drivers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::EngineResult;
    use crate::engine::types::{QueryOutcome, TargetConfig};
    use async_trait::async_trait;

    struct MockDriver {
        id: &'static str,
    }

    #[async_trait]
    impl DataEngine for MockDriver {
        fn driver_id(&self) -> &'static str {
            self.id
        }

        fn driver_name(&self) -> &'static str {
            "Mock Driver"
        }

        async fn execute(&self, _config: &TargetConfig, _sql: &str) -> EngineResult<QueryOutcome> {
            Ok(QueryOutcome::Affected { count: 0 })
        }
    }

    #[test]
    fn registry_basics() {
        let mut registry = DriverRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(MockDriver { id: "mock1" }));
        registry.register(Arc::new(MockDriver { id: "mock2" }));
        assert_eq!(registry.len(), 2);

        assert!(registry.get("mock1").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn builtin_drivers_are_registered() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.get("mysql").is_some());
        assert!(registry.get("postgres").is_some());
        assert!(registry.get("sqlite").is_some());
    }
}
