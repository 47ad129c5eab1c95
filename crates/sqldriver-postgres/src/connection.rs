//! PostgreSQL session over libpq.
//!
//! [`PgConnection`] owns one `PGconn`. It runs ad-hoc commands, prepares named
//! statements and doubles as its own transaction handle. Every call blocks
//! until the server answers; one request is in flight at a time.

// libpq counts parameters with C ints
#![allow(clippy::cast_possible_truncation)]

use std::cell::Cell;
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;

use pq_sys::{ConnStatusType, ExecStatusType, PGTransactionStatusType};
use sqldriver_core::error::{
    CommandError, CommandErrorKind, ConnectionError, ConnectionErrorKind, DecodeError,
    DecodeErrorKind, Resource,
};
use sqldriver_core::{
    Error, ExecResult, Execer, IsolationLevel, Result, Session, Statement, Transaction, Value,
};

use crate::config::PgConfig;
use crate::ffi::{self, PGconn, PGresult};
use crate::lifecycle::{HandleKind, Owned};
use crate::statement::PgStatement;
use crate::types::encode_param;

/// Transaction state reported by libpq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Idle, outside a transaction block
    Idle,
    /// A command is in progress
    Active,
    /// Idle inside a valid transaction block
    InTransaction,
    /// Idle inside a failed transaction block
    InFailed,
    /// Bad connection, or the connection was closed
    Unknown,
}

/// A live PostgreSQL session.
///
/// Statements and result sets borrow the connection, so it cannot be closed
/// while any of them exists. After an explicit [`close`](Self::close) every
/// operation returns [`Error::Closed`].
pub struct PgConnection {
    db: Owned<PGconn>,
    /// Suffix for the next prepared statement name.
    next_statement: Cell<u64>,
}

// SAFETY: libpq connections may move between threads as long as only one
// thread uses them at a time. `PgConnection` is not `Sync`, and statements
// and results borrow it, so they cannot outlive a move.
unsafe impl Send for PgConnection {}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("open", &self.db.is_open())
            .field("statements_prepared", &self.next_statement.get())
            .finish()
    }
}

impl PgConnection {
    /// Connect with a libpq conninfo string such as
    /// `host=localhost dbname=app user=app`. The string is forwarded to libpq
    /// unparsed.
    pub fn open(conninfo: &str) -> Result<Self> {
        let conninfo = CString::new(conninfo).map_err(|err| ConnectionError {
            kind: ConnectionErrorKind::InvalidDsn,
            message: format!(
                "connection string contains a NUL byte at offset {}",
                err.nul_position()
            ),
        })?;

        // SAFETY: conninfo is a valid C string for the duration of the call
        let raw = unsafe { pq_sys::PQconnectdb(conninfo.as_ptr()) };
        let Some(mut db) = Owned::new(raw, HandleKind::Connection) else {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: ffi::conn_error_message(raw),
            }));
        };

        // SAFETY: raw is the live handle owned by db
        match unsafe { pq_sys::PQstatus(raw) } {
            ConnStatusType::CONNECTION_OK => {}
            _ => {
                let message = ffi::conn_error_message(raw);
                db.close();
                tracing::debug!(error = %message, "connection failed");
                return Err(Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Connect,
                    message,
                }));
            }
        }

        ffi::install_notice_processor(raw);
        let conn = Self {
            db,
            next_statement: Cell::new(0),
        };
        tracing::debug!(server_version = conn.server_version().unwrap_or(0), "connected");
        Ok(conn)
    }

    /// Connect using a [`PgConfig`].
    pub fn connect(config: &PgConfig) -> Result<Self> {
        Self::open(&config.to_conninfo())
    }

    pub fn is_open(&self) -> bool {
        self.db.is_open()
    }

    /// Execute a command without preparing it.
    ///
    /// With no arguments the SQL is sent as a simple query, so it may hold
    /// several statements. With arguments it is sent as a parameterized
    /// query with `$1`, `$2`, ... placeholders.
    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let conn = self.handle()?;
        let command = ffi::to_cstring(sql, sql, CommandErrorKind::Exec)?;

        let res = if args.is_empty() {
            // SAFETY: conn is live and command outlives the call
            unsafe { pq_sys::PQexec(conn, command.as_ptr()) }
        } else {
            let params = BoundParams::encode(args, sql)?;
            // SAFETY: conn is live; params and command outlive the call
            unsafe {
                pq_sys::PQexecParams(
                    conn,
                    command.as_ptr(),
                    params.len(),
                    ptr::null(),
                    params.values(),
                    ptr::null(),
                    ptr::null(),
                    0,
                )
            }
        };

        let mut res = self.check(conn, res, sql, CommandErrorKind::Exec, HandleKind::Result)?;
        let outcome = rows_affected(&res, sql);
        res.close();
        let rows = outcome.as_ref().ok().and_then(ExecResult::rows_affected);
        tracing::debug!(sql, rows = ?rows, "executed");
        outcome
    }

    /// Prepare `sql` as a named server-side statement.
    ///
    /// The statement is described right away so its parameter count and
    /// result columns are known before the first execution.
    pub fn prepare(&self, sql: &str) -> Result<PgStatement<'_>> {
        let conn = self.handle()?;
        let name = self.next_statement_name();
        let c_name = ffi::to_cstring(&name, sql, CommandErrorKind::Prepare)?;
        let query = ffi::to_cstring(sql, sql, CommandErrorKind::Prepare)?;

        // SAFETY: conn is live; c_name and query outlive the call
        let res = unsafe {
            pq_sys::PQprepare(conn, c_name.as_ptr(), query.as_ptr(), 0, ptr::null())
        };
        let mut prepared =
            self.check(conn, res, sql, CommandErrorKind::Prepare, HandleKind::Result)?;
        prepared.close();

        // SAFETY: conn is live and c_name outlives the call
        let res = unsafe { pq_sys::PQdescribePrepared(conn, c_name.as_ptr()) };
        let description =
            match self.check(conn, res, sql, CommandErrorKind::Describe, HandleKind::Statement) {
                Ok(description) => description,
                Err(err) => {
                    self.deallocate(&name);
                    return Err(err);
                }
            };

        tracing::debug!(statement = %name, sql, "prepared");
        Ok(PgStatement::new(self, name, c_name, sql.to_string(), description))
    }

    /// Start a transaction. The connection itself is the transaction handle.
    pub fn begin(&self) -> Result<&Self> {
        self.exec("BEGIN", &[])?;
        Ok(self)
    }

    /// Start a transaction at the given isolation level.
    pub fn begin_with(&self, isolation: IsolationLevel) -> Result<&Self> {
        self.exec(&format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql()), &[])?;
        Ok(self)
    }

    pub fn commit(&self) -> Result<()> {
        self.exec("COMMIT", &[]).map(|_| ())
    }

    pub fn rollback(&self) -> Result<()> {
        self.exec("ROLLBACK", &[]).map(|_| ())
    }

    /// Close the session. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.db.is_open() {
            self.db.close();
            tracing::debug!("connection closed");
        }
        Ok(())
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        let Some(conn) = self.db.as_ptr() else {
            return TransactionStatus::Unknown;
        };
        // SAFETY: conn is live
        match unsafe { pq_sys::PQtransactionStatus(conn) } {
            PGTransactionStatusType::PQTRANS_IDLE => TransactionStatus::Idle,
            PGTransactionStatusType::PQTRANS_ACTIVE => TransactionStatus::Active,
            PGTransactionStatusType::PQTRANS_INTRANS => TransactionStatus::InTransaction,
            PGTransactionStatusType::PQTRANS_INERROR => TransactionStatus::InFailed,
            _ => TransactionStatus::Unknown,
        }
    }

    /// Server version as an integer, e.g. `160002` for 16.2.
    pub fn server_version(&self) -> Result<i32> {
        let conn = self.handle()?;
        // SAFETY: conn is live
        Ok(unsafe { pq_sys::PQserverVersion(conn) })
    }

    /// Run a prepared statement by name and return its checked result.
    pub(crate) fn exec_prepared(
        &self,
        name: &CStr,
        sql: &str,
        args: &[Value],
        kind: CommandErrorKind,
    ) -> Result<Owned<PGresult>> {
        let conn = self.handle()?;
        let params = BoundParams::encode(args, sql)?;
        // SAFETY: conn is live; name and params outlive the call
        let res = unsafe {
            pq_sys::PQexecPrepared(
                conn,
                name.as_ptr(),
                params.len(),
                params.values(),
                ptr::null(),
                ptr::null(),
                0,
            )
        };
        self.check(conn, res, sql, kind, HandleKind::Result)
    }

    /// Drop a server-side prepared statement. Failures are logged, not
    /// returned.
    pub(crate) fn deallocate(&self, name: &str) {
        let Some(conn) = self.db.as_ptr() else {
            return;
        };
        let sql = format!("DEALLOCATE \"{name}\"");
        let Ok(command) = CString::new(sql.as_str()) else {
            return;
        };
        // SAFETY: conn is live and command outlives the call
        let res = unsafe { pq_sys::PQexec(conn, command.as_ptr()) };
        match self.check(conn, res, &sql, CommandErrorKind::Exec, HandleKind::Result) {
            Ok(mut res) => res.close(),
            Err(err) => tracing::debug!(statement = name, error = %err, "deallocate failed"),
        }
    }

    fn handle(&self) -> Result<*mut PGconn> {
        self.db.as_ptr().ok_or(Error::Closed(Resource::Connection))
    }

    fn next_statement_name(&self) -> String {
        let n = self.next_statement.get();
        self.next_statement.set(n + 1);
        format!("sqldriver_{n}")
    }

    /// Take ownership of a command result, turning failure statuses into
    /// errors. A failed result is released before the error is returned.
    fn check(
        &self,
        conn: *mut PGconn,
        res: *mut PGresult,
        sql: &str,
        kind: CommandErrorKind,
        handle: HandleKind,
    ) -> Result<Owned<PGresult>> {
        let Some(mut owned) = Owned::new(res, handle) else {
            return Err(Error::Command(CommandError {
                kind,
                sql: Some(sql.to_string()),
                sqlstate: None,
                message: ffi::conn_error_message(conn),
            }));
        };

        // SAFETY: res is live and owned above
        match unsafe { pq_sys::PQresultStatus(res) } {
            ExecStatusType::PGRES_COMMAND_OK
            | ExecStatusType::PGRES_TUPLES_OK
            | ExecStatusType::PGRES_EMPTY_QUERY => Ok(owned),
            _ => {
                let mut message = ffi::result_error_message(res);
                if message.is_empty() {
                    message = format!("unexpected result status {}", ffi::result_status_name(res));
                }
                let sqlstate = ffi::result_sqlstate(res);
                owned.close();
                Err(Error::Command(CommandError {
                    kind,
                    sql: Some(sql.to_string()),
                    sqlstate,
                    message,
                }))
            }
        }
    }
}

/// Classify a successful command by its affected-row count.
pub(crate) fn rows_affected(res: &Owned<PGresult>, sql: &str) -> Result<ExecResult> {
    let Some(ptr) = res.as_ptr() else {
        return Err(Error::Closed(Resource::ResultSet));
    };
    // SAFETY: ptr is live; libpq owns the returned string
    let count = unsafe { ffi::copy_string(pq_sys::PQcmdTuples(ptr)) };
    if count.is_empty() {
        return Ok(ExecResult::DdlSuccess);
    }
    count.parse::<u64>().map(ExecResult::RowsAffected).map_err(|_| {
        Error::Decode(DecodeError::new(
            DecodeErrorKind::RowCount,
            format!("invalid affected row count {count:?} for {sql}"),
        ))
    })
}

/// Parameters encoded as C strings, with the pointer array libpq reads.
#[derive(Debug)]
struct BoundParams {
    // Owns the strings `pointers` refers to.
    _values: Vec<Option<CString>>,
    pointers: Vec<*const c_char>,
}

impl BoundParams {
    fn encode(args: &[Value], sql: &str) -> std::result::Result<Self, CommandError> {
        let values = args
            .iter()
            .map(|arg| {
                encode_param(arg)
                    .map(|text| ffi::to_cstring(&text, sql, CommandErrorKind::Bind))
                    .transpose()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let pointers = values
            .iter()
            .map(|value| value.as_ref().map_or(ptr::null(), |text| text.as_ptr()))
            .collect();
        Ok(Self {
            _values: values,
            pointers,
        })
    }

    fn len(&self) -> c_int {
        self.pointers.len() as c_int
    }

    fn values(&self) -> *const *const c_char {
        if self.pointers.is_empty() {
            ptr::null()
        } else {
            self.pointers.as_ptr()
        }
    }
}

impl Session for PgConnection {
    fn prepare<'a>(&'a self, sql: &str) -> Result<Box<dyn Statement + 'a>> {
        Ok(Box::new(PgConnection::prepare(self, sql)?))
    }

    fn begin(&self) -> Result<&dyn Transaction> {
        let tx: &dyn Transaction = PgConnection::begin(self)?;
        Ok(tx)
    }

    fn close(&mut self) -> Result<()> {
        PgConnection::close(self)
    }

    fn execer(&self) -> Option<&dyn Execer> {
        Some(self)
    }
}

impl Execer for PgConnection {
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        PgConnection::exec(self, sql, args)
    }
}

impl Transaction for PgConnection {
    fn commit(&self) -> Result<()> {
        PgConnection::commit(self)
    }

    fn rollback(&self) -> Result<()> {
        PgConnection::rollback(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_conninfo_is_a_connection_error() {
        let err = PgConnection::open("this is not a conninfo string").unwrap_err();
        match err {
            Error::Connection(e) => {
                assert_eq!(e.kind, ConnectionErrorKind::Connect);
                assert!(!e.message.is_empty());
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_server_is_a_connection_error() {
        let err = PgConnection::open("host=/nonexistent/sqldriver/socket connect_timeout=1")
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_nul_in_conninfo_is_rejected() {
        let err = PgConnection::open("host=local\0host").unwrap_err();
        match err {
            Error::Connection(e) => {
                assert_eq!(e.kind, ConnectionErrorKind::InvalidDsn);
                assert!(e.message.contains("offset 10"));
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn test_bound_params_null_is_null_pointer() {
        let params = BoundParams::encode(
            &[Value::Int(3), Value::Null, Value::Bool(true)],
            "INSERT INTO t VALUES ($1, $2, $3)",
        )
        .unwrap();
        assert_eq!(params.len(), 3);
        assert!(!params.pointers[0].is_null());
        assert!(params.pointers[1].is_null());
        // SAFETY: the pointer refers to a string owned by params
        let text = unsafe { CStr::from_ptr(params.pointers[2]) };
        assert_eq!(text.to_str().unwrap(), "t");
    }

    #[test]
    fn test_bound_params_empty() {
        let params = BoundParams::encode(&[], "SELECT 1").unwrap();
        assert_eq!(params.len(), 0);
        assert!(params.values().is_null());
    }

    #[test]
    fn test_bound_params_reject_nul() {
        let err = BoundParams::encode(&[Value::Text("a\0b".to_string())], "SELECT $1")
            .unwrap_err();
        assert_eq!(err.kind, CommandErrorKind::Bind);
    }

    #[test]
    fn test_rows_affected_classification() {
        let make = |status| {
            // SAFETY: a null connection is allowed for client-built results
            let ptr = unsafe { pq_sys::PQmakeEmptyPGresult(ptr::null_mut(), status) };
            Owned::new(ptr, HandleKind::Result).unwrap()
        };
        let mut res = make(ExecStatusType::PGRES_COMMAND_OK);
        assert_eq!(rows_affected(&res, "CREATE TABLE t ()").unwrap(), ExecResult::DdlSuccess);
        res.close();

        let mut closed = make(ExecStatusType::PGRES_COMMAND_OK);
        closed.close();
        assert!(rows_affected(&closed, "SELECT 1").is_err());
    }
}
