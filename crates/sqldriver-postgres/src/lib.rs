//! PostgreSQL adapter for sqldriver.
//!
// libpq is reached over FFI, so this crate needs unsafe code
#![allow(unsafe_code)]
//!
//! `sqldriver-postgres` implements the `sqldriver-core` adapter contract on
//! top of libpq (through the `pq-sys` bindings). Connection strings are libpq
//! conninfo strings and are handed to libpq unparsed.
//!
//! # Role In The Architecture
//!
//! - `PgDriver` is registered under `"postgres"` by [`register`]
//! - `PgConnection` implements `Session`, `Execer` and `Transaction`
//! - `PgStatement` implements `Statement`, `ResultSet` implements `Rows`
//!
//! # Type Mapping
//!
//! Parameters are sent as untyped text chosen by the shape of each
//! [`Value`](sqldriver_core::Value): booleans as `t`/`f`, byte strings as
//! `\x`-prefixed hex, timestamps as `YYYY-MM-DD HH:MM:SS.ffffff±hh`, `Null`
//! as SQL NULL and everything else in its natural text form.
//!
//! Result cells are decoded by column type OID. Booleans come back as the
//! text `"true"`/`"false"`, `bytea` as `Value::Bytes`, and the remaining
//! built-in scalar types as `Value::Text`. Any other OID is a decode error.
//!
//! # Resource Lifecycle
//!
//! Connections, statements and result sets each own one native handle. It is
//! released by `close` or, failing that, by `Drop`, exactly once. The
//! [`lifecycle`] module counts releases and can report leaks.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqldriver_core::{Fetch, Value};
//! use sqldriver_postgres::{PgConfig, PgConnection};
//!
//! let config = PgConfig::new("localhost", "postgres", "app");
//! let mut conn = PgConnection::connect(&config)?;
//!
//! conn.exec("CREATE TEMP TABLE t (count INT)", &[])?;
//! let mut stmt = conn.prepare("INSERT INTO t (count) VALUES ($1)")?;
//! for n in 1..=3 {
//!     stmt.exec(&[Value::Int(n)])?;
//! }
//! stmt.close()?;
//!
//! let mut stmt = conn.prepare("SELECT count FROM t ORDER BY count DESC")?;
//! let mut rows = stmt.query(&[])?;
//! let mut row = vec![Value::Null];
//! while rows.next(&mut row)? == Fetch::Row {
//!     println!("{:?}", row[0]);
//! }
//! rows.close()?;
//! stmt.close()?;
//! conn.close()?;
//! ```

pub mod config;
pub mod connection;
pub mod driver;
mod ffi;
pub mod lifecycle;
pub mod result;
pub mod statement;
pub mod types;

pub use config::{PgConfig, SslMode};
pub use connection::{PgConnection, TransactionStatus};
pub use driver::{DRIVER_NAME, PgDriver, register};
pub use ffi::libpq_version;
pub use lifecycle::{LeakCheck, LifecycleStats};
pub use result::ResultSet;
pub use statement::PgStatement;
