//! Named server-side prepared statements.

#![allow(clippy::cast_possible_truncation)]

use std::ffi::{CString, c_int};

use sqldriver_core::error::{CommandErrorKind, Resource};
use sqldriver_core::{Error, ExecResult, Result, Rows, Statement, Value};

use crate::connection::{PgConnection, rows_affected};
use crate::ffi::{self, PGresult};
use crate::lifecycle::Owned;
use crate::result::ResultSet;

/// A statement prepared on the server under a connection-unique name.
///
/// Holds the describe result, which carries the parameter count and the
/// result columns.
pub struct PgStatement<'conn> {
    conn: &'conn PgConnection,
    name: String,
    c_name: CString,
    sql: String,
    nparams: usize,
    description: Owned<PGresult>,
}

impl std::fmt::Debug for PgStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStatement")
            .field("name", &self.name)
            .field("sql", &self.sql)
            .field("params", &self.nparams)
            .field("open", &self.description.is_open())
            .finish()
    }
}

impl<'conn> PgStatement<'conn> {
    pub(crate) fn new(
        conn: &'conn PgConnection,
        name: String,
        c_name: CString,
        sql: String,
        description: Owned<PGresult>,
    ) -> Self {
        let nparams = description
            .as_ptr()
            // SAFETY: the describe result is live
            .map(|ptr| usize::try_from(unsafe { pq_sys::PQnparams(ptr) }).unwrap_or(0))
            .unwrap_or(0);
        Self {
            conn,
            name,
            c_name,
            sql,
            nparams,
            description,
        }
    }

    /// Server-side name, e.g. `sqldriver_0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `$n` parameters the server found in the statement.
    pub fn num_input(&self) -> usize {
        self.nparams
    }

    /// Parameter type OIDs inferred by the server.
    pub fn param_types(&self) -> Result<Vec<u32>> {
        let ptr = self.handle()?;
        Ok((0..self.nparams)
            // SAFETY: ptr is live and i is below PQnparams
            .map(|i| unsafe { pq_sys::PQparamtype(ptr, i as c_int) })
            .collect())
    }

    /// Names of the columns the statement returns. Empty for commands.
    pub fn column_names(&self) -> Result<Vec<String>> {
        let ptr = self.handle()?;
        // SAFETY: ptr is live
        let ncols = unsafe { pq_sys::PQnfields(ptr) };
        Ok((0..ncols)
            // SAFETY: ptr is live and i is below PQnfields
            .map(|i| unsafe { ffi::copy_string(pq_sys::PQfname(ptr, i)) })
            .collect())
    }

    /// Execute as a command and report the affected-row count.
    pub fn exec(&self, args: &[Value]) -> Result<ExecResult> {
        self.handle()?;
        let mut res = self
            .conn
            .exec_prepared(&self.c_name, &self.sql, args, CommandErrorKind::Exec)?;
        let outcome = rows_affected(&res, &self.sql);
        res.close();
        let rows = outcome.as_ref().ok().and_then(ExecResult::rows_affected);
        tracing::debug!(statement = %self.name, rows = ?rows, "statement executed");
        outcome
    }

    /// Execute as a query. A query matching no rows still yields a result set.
    pub fn query(&self, args: &[Value]) -> Result<ResultSet<'conn>> {
        self.handle()?;
        let res = self
            .conn
            .exec_prepared(&self.c_name, &self.sql, args, CommandErrorKind::Query)?;
        let rows = ResultSet::new(res);
        tracing::debug!(statement = %self.name, rows = rows.row_count(), "statement queried");
        Ok(rows)
    }

    /// Release the statement and drop it on the server. Later calls do
    /// nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.description.is_open() {
            self.description.close();
            self.conn.deallocate(&self.name);
            tracing::debug!(statement = %self.name, "statement closed");
        }
        Ok(())
    }

    fn handle(&self) -> Result<*mut PGresult> {
        self.description
            .as_ptr()
            .ok_or(Error::Closed(Resource::Statement))
    }
}

impl Statement for PgStatement<'_> {
    fn num_input(&self) -> usize {
        PgStatement::num_input(self)
    }

    fn exec(&self, args: &[Value]) -> Result<ExecResult> {
        PgStatement::exec(self, args)
    }

    fn query(&self, args: &[Value]) -> Result<Box<dyn Rows + '_>> {
        Ok(Box::new(PgStatement::query(self, args)?))
    }

    fn close(&mut self) -> Result<()> {
        PgStatement::close(self)
    }
}
