//! Process-wide driver registry.
//!
//! Drivers register themselves under a name (for example `"postgres"`) once
//! at startup; the access layer then opens sessions by name.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::driver::{Driver, Session};
use crate::error::{ConfigError, Error, Result};

type DriverMap = HashMap<String, Arc<dyn Driver>>;

fn drivers_map() -> &'static RwLock<DriverMap> {
    static DRIVERS: OnceLock<RwLock<DriverMap>> = OnceLock::new();
    DRIVERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register `driver` under `name`.
///
/// Fails if a driver with the same name is already registered.
pub fn register(name: &str, driver: Arc<dyn Driver>) -> Result<()> {
    let mut map = drivers_map()
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if map.contains_key(name) {
        return Err(Error::Config(ConfigError {
            message: format!("driver {name:?} is already registered"),
        }));
    }
    tracing::debug!(driver = name, "registered driver");
    map.insert(name.to_string(), driver);
    Ok(())
}

/// Look up a registered driver.
pub fn driver(name: &str) -> Option<Arc<dyn Driver>> {
    drivers_map()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Names of all registered drivers, sorted.
pub fn drivers() -> Vec<String> {
    let mut names: Vec<String> = drivers_map()
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

/// Open a session with the driver registered under `name`.
pub fn open(name: &str, dsn: &str) -> Result<Box<dyn Session + Send>> {
    let driver = driver(name).ok_or_else(|| {
        Error::Config(ConfigError {
            message: format!("unknown driver {name:?} (forgotten import?)"),
        })
    })?;
    driver.open(dsn)
}
