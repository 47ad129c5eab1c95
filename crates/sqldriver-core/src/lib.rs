//! Core types and traits for sqldriver.
//!
//! This crate is the contract between a generic SQL access layer and the
//! database adapters underneath it:
//!
//! - `Value` for parameters and result cells
//! - `Error` with the connection / command / decode taxonomy
//! - `Driver`, `Session`, `Statement`, `Rows` and friends for the adapter contract
//! - `registry` for looking drivers up by name

pub mod driver;
pub mod error;
pub mod registry;
pub mod value;

pub use driver::{
    Driver, ExecResult, Execer, Fetch, IsolationLevel, Rows, Session, Statement, Transaction,
};
pub use error::{Error, Resource, Result};
pub use value::Value;
