//! Registry entry point.

use std::sync::{Arc, OnceLock};

use sqldriver_core::error::ConfigError;
use sqldriver_core::{Driver, Error, Result, Session, registry};

use crate::connection::PgConnection;

/// Name the driver registers under.
pub const DRIVER_NAME: &str = "postgres";

/// Opens [`PgConnection`]s from libpq conninfo strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDriver;

impl Driver for PgDriver {
    fn open(&self, dsn: &str) -> Result<Box<dyn Session + Send>> {
        Ok(Box::new(PgConnection::open(dsn)?))
    }
}

/// Register [`PgDriver`] as `"postgres"`.
///
/// Only the first call touches the registry. Later calls return the first
/// call's outcome, so a failed registration keeps failing.
pub fn register() -> Result<()> {
    static REGISTERED: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    register_once(&REGISTERED, DRIVER_NAME)
}

fn register_once(
    slot: &OnceLock<std::result::Result<(), String>>,
    name: &str,
) -> Result<()> {
    slot.get_or_init(|| {
        registry::register(name, Arc::new(PgDriver)).map_err(|err| match err {
            Error::Config(config) => config.message,
            other => other.to_string(),
        })
    })
    .clone()
    .map_err(|message| Error::Config(ConfigError { message }))
}
