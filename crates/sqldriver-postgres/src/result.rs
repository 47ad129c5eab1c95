//! Materialized query results.
//!
//! A [`ResultSet`] owns the `PGresult` of one successful query and walks it
//! with a forward-only cursor. Cells are decoded on demand by
//! [`decode_value`](crate::types::decode_value) as each row is fetched.

// libpq indexes rows and columns with C ints
#![allow(clippy::cast_possible_truncation)]

use std::cell::OnceCell;
use std::ffi::c_int;
use std::marker::PhantomData;

use sqldriver_core::error::{DecodeError, DecodeErrorKind, Resource};
use sqldriver_core::{Error, Fetch, Result, Rows, Value};

use crate::connection::PgConnection;
use crate::ffi::{self, PGresult};
use crate::lifecycle::Owned;
use crate::types::decode_value;

/// Rows returned by one query.
///
/// Borrows the connection it came from, so the connection cannot be closed
/// while the result is alive.
pub struct ResultSet<'conn> {
    res: Owned<PGresult>,
    nrows: usize,
    ncols: usize,
    /// Rows consumed so far; never exceeds `nrows`.
    position: usize,
    columns: OnceCell<Vec<String>>,
    _conn: PhantomData<&'conn PgConnection>,
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("rows", &self.nrows)
            .field("columns", &self.ncols)
            .field("position", &self.position)
            .field("open", &self.res.is_open())
            .finish()
    }
}

impl<'conn> ResultSet<'conn> {
    pub(crate) fn new(res: Owned<PGresult>) -> Self {
        let (nrows, ncols) = match res.as_ptr() {
            // SAFETY: ptr is a live result
            Some(ptr) => unsafe {
                (
                    usize::try_from(pq_sys::PQntuples(ptr)).unwrap_or(0),
                    usize::try_from(pq_sys::PQnfields(ptr)).unwrap_or(0),
                )
            },
            None => (0, 0),
        };
        Self {
            res,
            nrows,
            ncols,
            position: 0,
            columns: OnceCell::new(),
            _conn: PhantomData,
        }
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.nrows
    }

    /// Number of columns in the result.
    pub fn column_count(&self) -> usize {
        self.ncols
    }

    /// Number of rows already fetched.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_closed(&self) -> bool {
        !self.res.is_open()
    }

    /// Column names, read once and cached.
    ///
    /// Empty if the result was closed before the names were first read.
    pub fn columns(&self) -> &[String] {
        self.columns.get_or_init(|| match self.res.as_ptr() {
            Some(ptr) => (0..self.ncols)
                // SAFETY: ptr is live and i is below PQnfields
                .map(|i| unsafe { ffi::copy_string(pq_sys::PQfname(ptr, i as c_int)) })
                .collect(),
            None => Vec::new(),
        })
    }

    /// Type OID of every column.
    pub fn column_types(&self) -> Result<Vec<u32>> {
        let ptr = self.handle()?;
        Ok((0..self.ncols)
            // SAFETY: ptr is live and i is below PQnfields
            .map(|i| unsafe { pq_sys::PQftype(ptr, i as c_int) })
            .collect())
    }

    /// Fetch the next row into `dest`.
    ///
    /// Returns [`Fetch::EndOfData`] once every row has been read, and keeps
    /// returning it. If any cell fails to decode, `dest` is left untouched
    /// and the failing row counts as consumed.
    pub fn next(&mut self, dest: &mut [Value]) -> Result<Fetch> {
        let ptr = self.handle()?;
        if self.position >= self.nrows {
            return Ok(Fetch::EndOfData);
        }
        if dest.len() > self.ncols {
            return Err(Error::Decode(DecodeError::new(
                DecodeErrorKind::ColumnOutOfRange,
                format!(
                    "{} destination slots for {} result columns",
                    dest.len(),
                    self.ncols
                ),
            )));
        }

        let row = self.position;
        self.position += 1;

        let mut decoded = Vec::with_capacity(dest.len());
        for col in 0..dest.len() {
            // SAFETY: ptr is live, row < nrows and col < ncols
            let value = unsafe { read_cell(ptr, row, col) }
                .map_err(|err| Error::Decode(err.at_column(col)))?;
            decoded.push(value);
        }

        for (slot, value) in dest.iter_mut().zip(decoded) {
            *slot = value;
        }
        Ok(Fetch::Row)
    }

    /// Release the result. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        self.res.close();
        Ok(())
    }

    fn handle(&self) -> Result<*mut PGresult> {
        self.res.as_ptr().ok_or(Error::Closed(Resource::ResultSet))
    }
}

/// Decode one cell of a live result.
///
/// # Safety
///
/// `res` must be live, with `row` and `col` in range.
unsafe fn read_cell(
    res: *mut PGresult,
    row: usize,
    col: usize,
) -> std::result::Result<Value, DecodeError> {
    let (row, col) = (row as c_int, col as c_int);
    // SAFETY: guaranteed by the caller
    unsafe {
        let type_oid = pq_sys::PQftype(res, col);
        if pq_sys::PQgetisnull(res, row, col) == 1 {
            return decode_value(type_oid, None);
        }
        let data = pq_sys::PQgetvalue(res, row, col);
        let len = usize::try_from(pq_sys::PQgetlength(res, row, col)).unwrap_or(0);
        let raw = std::slice::from_raw_parts(data.cast::<u8>(), len);
        decode_value(type_oid, Some(raw))
    }
}

impl Rows for ResultSet<'_> {
    fn columns(&self) -> &[String] {
        ResultSet::columns(self)
    }

    fn next(&mut self, dest: &mut [Value]) -> Result<Fetch> {
        ResultSet::next(self, dest)
    }

    fn close(&mut self) -> Result<()> {
        ResultSet::close(self)
    }
}

/// Build results client-side, without a server.
#[cfg(test)]
pub(crate) mod testing {
    use std::ffi::{CString, c_char, c_int};

    use super::ResultSet;
    use crate::lifecycle::{HandleKind, Owned};

    /// A `PGRES_TUPLES_OK` result with the given `(name, type oid)` columns
    /// and text cells (`None` is NULL).
    pub(crate) fn synthetic_result(
        columns: &[(&str, u32)],
        rows: &[Vec<Option<&str>>],
    ) -> ResultSet<'static> {
        // SAFETY: a null connection is allowed for client-built results
        let ptr = unsafe {
            pq_sys::PQmakeEmptyPGresult(
                std::ptr::null_mut(),
                pq_sys::ExecStatusType::PGRES_TUPLES_OK,
            )
        };
        let res = Owned::new(ptr, HandleKind::Result).expect("PQmakeEmptyPGresult failed");

        let names: Vec<CString> = columns
            .iter()
            .map(|(name, _)| CString::new(*name).unwrap())
            .collect();
        let mut attrs: Vec<pq_sys::pgresAttDesc> = columns
            .iter()
            .zip(&names)
            .map(|((_, type_oid), name)| pq_sys::pgresAttDesc {
                name: name.as_ptr().cast_mut(),
                tableid: 0,
                columnid: 0,
                format: 0,
                typid: *type_oid,
                typlen: -1,
                atttypmod: -1,
            })
            .collect();
        // SAFETY: ptr is live; libpq copies the descriptors and names
        let ok = unsafe { pq_sys::PQsetResultAttrs(ptr, attrs.len() as c_int, attrs.as_mut_ptr()) };
        assert_eq!(ok, 1, "PQsetResultAttrs failed");

        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let text = cell.map(|s| CString::new(s).unwrap());
                let (value, len) = match &text {
                    Some(s) => (s.as_ptr().cast_mut(), s.as_bytes().len() as c_int),
                    None => (std::ptr::null_mut::<c_char>(), -1),
                };
                // SAFETY: ptr is live; libpq copies the value
                let ok = unsafe { pq_sys::PQsetvalue(ptr, r as c_int, c as c_int, value, len) };
                assert_eq!(ok, 1, "PQsetvalue failed");
            }
        }

        ResultSet::new(res)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::synthetic_result;
    use super::*;
    use crate::types::oid;

    fn counts() -> ResultSet<'static> {
        synthetic_result(
            &[("count", oid::INT4)],
            &[vec![Some("3")], vec![Some("2")], vec![Some("1")]],
        )
    }

    #[test]
    fn test_columns_are_cached() {
        let rs = synthetic_result(
            &[("id", oid::INT4), ("name", oid::VARCHAR)],
            &[vec![Some("1"), Some("bob")]],
        );
        assert_eq!(rs.columns(), ["id", "name"]);
        let first = rs.columns().as_ptr();
        assert_eq!(rs.columns().as_ptr(), first);
        assert_eq!(rs.column_types().unwrap(), vec![oid::INT4, oid::VARCHAR]);
    }

    #[test]
    fn test_cursor_exhaustion() {
        let mut rs = counts();
        assert_eq!(rs.row_count(), 3);

        let mut dest = vec![Value::Null];
        let mut seen = Vec::new();
        for _ in 0..3 {
            assert_eq!(rs.next(&mut dest).unwrap(), Fetch::Row);
            seen.push(dest[0].clone());
        }
        assert_eq!(
            seen,
            vec![
                Value::Text("3".to_string()),
                Value::Text("2".to_string()),
                Value::Text("1".to_string()),
            ]
        );

        for _ in 0..3 {
            assert_eq!(rs.next(&mut dest).unwrap(), Fetch::EndOfData);
        }
        assert_eq!(rs.position(), 3);
        rs.close().unwrap();
    }

    #[test]
    fn test_empty_result() {
        let mut rs = synthetic_result(&[("count", oid::INT4)], &[]);
        let mut dest = vec![Value::Null];
        assert_eq!(rs.next(&mut dest).unwrap(), Fetch::EndOfData);
        assert_eq!(rs.columns(), ["count"]);
        rs.close().unwrap();
    }

    #[test]
    fn test_null_cells() {
        let mut rs = synthetic_result(
            &[("flag", oid::BOOL), ("data", oid::BYTEA), ("doc", 114)],
            &[vec![None, None, None]],
        );
        let mut dest = vec![Value::Bool(true), Value::Int(1), Value::Int(2)];
        assert_eq!(rs.next(&mut dest).unwrap(), Fetch::Row);
        assert_eq!(dest, vec![Value::Null, Value::Null, Value::Null]);
        rs.close().unwrap();
    }

    #[test]
    fn test_mixed_row_decoding() {
        let mut rs = synthetic_result(
            &[("ok", oid::BOOL), ("blob", oid::BYTEA), ("n", oid::NUMERIC)],
            &[vec![Some("t"), Some("\\x000102"), Some("1.50")]],
        );
        let mut dest = vec![Value::Null; 3];
        assert_eq!(rs.next(&mut dest).unwrap(), Fetch::Row);
        assert_eq!(
            dest,
            vec![
                Value::Text("true".to_string()),
                Value::Bytes(vec![0, 1, 2]),
                Value::Text("1.50".to_string()),
            ]
        );
        rs.close().unwrap();
    }

    #[test]
    fn test_decode_failure_delivers_no_partial_row() {
        let mut rs = synthetic_result(
            &[("name", oid::TEXT), ("blob", oid::BYTEA)],
            &[
                vec![Some("alice"), Some("not hex")],
                vec![Some("bob"), Some("\\xff")],
            ],
        );
        let mut dest = vec![Value::Null, Value::Null];
        let err = rs.next(&mut dest).unwrap_err();
        match err {
            Error::Decode(e) => {
                assert_eq!(e.kind, DecodeErrorKind::InvalidByteString);
                assert_eq!(e.column, Some(1));
                assert!(e.to_string().contains("invalid byte string format"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(dest, vec![Value::Null, Value::Null]);

        assert_eq!(rs.next(&mut dest).unwrap(), Fetch::Row);
        assert_eq!(dest, vec![Value::Text("bob".to_string()), Value::Bytes(vec![0xff])]);
        rs.close().unwrap();
    }

    #[test]
    fn test_unsupported_type_names_oid() {
        let mut rs = synthetic_result(&[("doc", 114)], &[vec![Some("{}")]]);
        let mut dest = vec![Value::Null];
        let err = rs.next(&mut dest).unwrap_err();
        assert!(err.to_string().contains("unsupported type identifier: 114"));
        rs.close().unwrap();
    }

    #[test]
    fn test_too_many_destination_slots() {
        let mut rs = counts();
        let mut dest = vec![Value::Null, Value::Null];
        let err = rs.next(&mut dest).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError {
                kind: DecodeErrorKind::ColumnOutOfRange,
                ..
            })
        ));
        assert_eq!(rs.position(), 0);
        rs.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut rs = counts();
        let columns = rs.columns().to_vec();
        rs.close().unwrap();
        rs.close().unwrap();
        assert!(rs.is_closed());
        assert_eq!(rs.columns(), columns.as_slice());

        let mut dest = vec![Value::Null];
        assert!(matches!(
            rs.next(&mut dest),
            Err(Error::Closed(Resource::ResultSet))
        ));
    }

    #[test]
    fn test_columns_after_early_close_are_empty() {
        let mut rs = counts();
        rs.close().unwrap();
        assert!(rs.columns().is_empty());
    }

    #[test]
    fn test_rows_trait_object() {
        let mut rows: Box<dyn Rows> = Box::new(counts());
        assert_eq!(rows.columns(), ["count"]);
        let mut dest = vec![Value::Null];
        assert_eq!(rows.next(&mut dest).unwrap(), Fetch::Row);
        assert_eq!(dest[0].as_i64(), Some(3));
        rows.close().unwrap();
        rows.close().unwrap();
    }
}
