//! The driver contract.
//!
//! A generic access layer talks to a database only through these traits:
//!
//! - [`Driver`] - opens sessions from a driver-specific parameter string
//! - [`Session`] - one live connection; prepares statements and starts transactions
//! - [`Execer`] - optional one-shot command execution without a prepare round trip
//! - [`Transaction`] - commit/rollback capability, usually the session itself
//! - [`Statement`] - a prepared statement executed with positional parameters
//! - [`Rows`] - a forward-only cursor over a result
//!
//! Every call is synchronous and blocks until the server answers. Sessions
//! process one request at a time and do no internal locking; callers that
//! share a session across threads must serialize access themselves.

use crate::error::Result;
use crate::value::Value;

/// Outcome of a command that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    /// The server reported how many rows the command touched.
    RowsAffected(u64),
    /// The command succeeded without a row count (DDL and similar).
    DdlSuccess,
}

impl ExecResult {
    /// Row count, if the server reported one.
    pub const fn rows_affected(&self) -> Option<u64> {
        match self {
            ExecResult::RowsAffected(n) => Some(*n),
            ExecResult::DdlSuccess => None,
        }
    }
}

/// Outcome of advancing a [`Rows`] cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// The destination slots hold the next row.
    Row,
    /// The cursor is exhausted. Repeated calls keep returning this.
    EndOfData,
}

/// Transaction isolation level.
///
/// Defines the degree to which one transaction must be isolated from
/// resource or data modifications made by other concurrent transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted: Transactions can see uncommitted changes from others.
    ReadUncommitted,

    /// Read committed: Transactions only see committed changes from others.
    /// This is the default for PostgreSQL.
    #[default]
    ReadCommitted,

    /// Repeatable read: Transactions see a consistent snapshot of the database.
    RepeatableRead,

    /// Serializable: Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Opens sessions. Registered once per process under a name.
pub trait Driver: Send + Sync {
    /// Open a session. `dsn` is handed to the driver unparsed.
    fn open(&self, dsn: &str) -> Result<Box<dyn Session + Send>>;
}

/// A live connection to the database.
pub trait Session {
    /// Prepare a statement on the server.
    fn prepare<'a>(&'a self, sql: &str) -> Result<Box<dyn Statement + 'a>>;

    /// Start a transaction. The returned handle may be the session itself.
    fn begin(&self) -> Result<&dyn Transaction>;

    /// Release the session. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// One-shot execution capability, when the driver has it.
    fn execer(&self) -> Option<&dyn Execer> {
        None
    }
}

/// One-shot command execution without an explicit prepare.
pub trait Execer {
    /// Execute `sql`, binding `args` positionally when non-empty.
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;
}

/// Commit/rollback capability.
pub trait Transaction {
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// A prepared statement.
pub trait Statement {
    /// Number of positional parameters. The access layer supplies exactly
    /// this many on each execution.
    fn num_input(&self) -> usize;

    /// Execute a command that does not return rows.
    fn exec(&self, args: &[Value]) -> Result<ExecResult>;

    /// Execute a query. An empty result is still a result.
    fn query(&self, args: &[Value]) -> Result<Box<dyn Rows + '_>>;

    /// Release the statement. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// A forward-only cursor over one command's rows.
pub trait Rows {
    /// Column names, in result order.
    fn columns(&self) -> &[String];

    /// Advance to the next row and decode it into `dest`.
    fn next(&mut self, dest: &mut [Value]) -> Result<Fetch>;

    /// Release the result. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_result_row_counts() {
        assert_eq!(ExecResult::RowsAffected(3).rows_affected(), Some(3));
        assert_eq!(ExecResult::DdlSuccess.rows_affected(), None);
    }

    #[test]
    fn isolation_level_sql() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
    }
}
