//! Thin helpers over the libpq bindings.
//!
//! Everything that turns a libpq pointer into an owned Rust value lives here,
//! so the rest of the crate only deals with `String`s and `Option`s.

use std::ffi::{CStr, CString, c_char, c_int, c_void};

use sqldriver_core::error::{CommandError, CommandErrorKind};

pub(crate) use pq_sys::{PGconn, PGresult};

/// `PG_DIAG_SQLSTATE` field code for `PQresultErrorField`.
const PG_DIAG_SQLSTATE: c_int = b'C' as c_int;

/// Copy a C string owned by libpq. A null pointer reads as empty.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn copy_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: caller guarantees ptr is a valid C string
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

/// The connection's most recent diagnostic, without the trailing newline.
pub(crate) fn conn_error_message(conn: *mut PGconn) -> String {
    if conn.is_null() {
        return "out of memory allocating connection".to_string();
    }
    // SAFETY: conn is a live handle; libpq owns the returned string
    let msg = unsafe { copy_string(pq_sys::PQerrorMessage(conn)) };
    msg.trim_end().to_string()
}

/// The result's error message, without the trailing newline.
pub(crate) fn result_error_message(res: *mut PGresult) -> String {
    // SAFETY: res is a live result; libpq owns the returned string
    let msg = unsafe { copy_string(pq_sys::PQresultErrorMessage(res)) };
    msg.trim_end().to_string()
}

/// The result's SQLSTATE code, if the server sent one.
pub(crate) fn result_sqlstate(res: *mut PGresult) -> Option<String> {
    // SAFETY: res is a live result; a missing field is a null pointer
    let code = unsafe { copy_string(pq_sys::PQresultErrorField(res, PG_DIAG_SQLSTATE)) };
    if code.is_empty() { None } else { Some(code) }
}

/// Textual name of a result status, e.g. `PGRES_COPY_IN`.
pub(crate) fn result_status_name(res: *mut PGresult) -> String {
    // SAFETY: res is a live result; PQresStatus returns a static string
    unsafe { copy_string(pq_sys::PQresStatus(pq_sys::PQresultStatus(res))) }
}

/// Convert SQL or a parameter to a C string, rejecting interior NULs.
pub(crate) fn to_cstring(
    text: &str,
    sql: &str,
    kind: CommandErrorKind,
) -> Result<CString, CommandError> {
    CString::new(text).map_err(|err| CommandError {
        kind,
        sql: Some(sql.to_string()),
        sqlstate: None,
        message: format!("text contains a NUL byte at offset {}", err.nul_position()),
    })
}

/// Version of the linked libpq, e.g. `160002` for 16.2.
pub fn libpq_version() -> i32 {
    // SAFETY: no arguments, no preconditions
    unsafe { pq_sys::PQlibVersion() }
}

/// Route server NOTICE/WARNING messages into tracing instead of stderr.
pub(crate) fn install_notice_processor(conn: *mut PGconn) {
    // SAFETY: conn is a live handle; the processor never touches `arg`
    unsafe {
        pq_sys::PQsetNoticeProcessor(conn, Some(forward_notice), std::ptr::null_mut());
    }
}

unsafe extern "C" fn forward_notice(_arg: *mut c_void, message: *const c_char) {
    // SAFETY: libpq passes a NUL-terminated message valid for this call
    let text = unsafe { copy_string(message) };
    let text = text.trim_end();
    if text.starts_with("WARNING") {
        tracing::warn!(target: "sqldriver_postgres::notice", "{text}");
    } else {
        tracing::info!(target: "sqldriver_postgres::notice", "{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_libpq_version() {
        let version = libpq_version();
        assert!(version >= 90_000, "Expected libpq 9.x or newer, got {version}");
    }

    #[test]
    fn test_copy_string_null_is_empty() {
        // SAFETY: null is explicitly allowed
        assert_eq!(unsafe { copy_string(std::ptr::null()) }, "");
    }

    #[test]
    fn test_to_cstring_rejects_nul() {
        let err = to_cstring("a\0b", "SELECT $1", CommandErrorKind::Bind).unwrap_err();
        assert_eq!(err.kind, CommandErrorKind::Bind);
        assert!(err.message.contains("offset 1"));
        assert_eq!(err.sql.as_deref(), Some("SELECT $1"));
    }
}
