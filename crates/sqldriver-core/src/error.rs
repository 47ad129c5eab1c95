//! Error types for driver operations.

use std::fmt;

/// The primary error type for all driver operations.
#[derive(Debug)]
pub enum Error {
    /// The session could not reach the ready state
    Connection(ConnectionError),
    /// The server rejected or failed a command
    Command(CommandError),
    /// A column value could not be converted to a host value
    Decode(DecodeError),
    /// Registry or configuration errors
    Config(ConfigError),
    /// Operation on a connection, statement or result set that was closed
    Closed(Resource),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish the session
    Connect,
    /// The connection string cannot be handed to the client library
    InvalidDsn,
}

#[derive(Debug)]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// Server-side prepare failed
    Prepare,
    /// Describing a prepared statement failed
    Describe,
    /// A one-shot or prepared command failed
    Exec,
    /// A prepared query failed
    Query,
    /// A parameter could not be handed to the client library
    Bind,
}

#[derive(Debug)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// Zero-based column index, when the failure belongs to a cell
    pub column: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A bytea cell without the `\x` prefix
    InvalidByteString,
    /// A bytea cell whose payload is not valid hex
    InvalidHex,
    /// No decode rule for this type OID
    UnsupportedType(u32),
    /// Text cell that is not valid UTF-8
    InvalidUtf8,
    /// Affected-row count that is not a number
    RowCount,
    /// More destination slots than result columns
    ColumnOutOfRange,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// The kind of handle an operation was attempted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Connection,
    Statement,
    ResultSet,
}

impl Resource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Resource::Connection => "connection",
            Resource::Statement => "statement",
            Resource::ResultSet => "result set",
        }
    }
}

impl Error {
    /// Is this a connection error that requires opening a new session?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Closed(Resource::Connection))
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Command(c) => c.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Command(c) => c.sql.as_deref(),
            _ => None,
        }
    }
}

impl CommandError {
    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }

    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23503")
    }
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            column: None,
            message: message.into(),
        }
    }

    /// Attach the column index the failing cell came from.
    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Command(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Command error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Command error: {}", e.message)
                }
            }
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Closed(resource) => write!(f, "{} is closed", resource.as_str()),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = self.column {
            write!(f, "column {}: {}", col, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<CommandError> for Error {
    fn from(err: CommandError) -> Self {
        Error::Command(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let command = CommandError {
            kind: CommandErrorKind::Exec,
            sql: Some("INSERT INTO t VALUES (1)".to_string()),
            sqlstate: Some("23505".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        };

        assert!(command.is_unique_violation());
        assert!(!command.is_foreign_key_violation());

        let err = Error::Command(command);
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(err.sql(), Some("INSERT INTO t VALUES (1)"));
        assert!(err.to_string().contains("SQLSTATE 23505"));
    }

    #[test]
    fn decode_error_names_column() {
        let err = DecodeError::new(DecodeErrorKind::InvalidByteString, "invalid byte string format")
            .at_column(2);
        assert_eq!(err.to_string(), "column 2: invalid byte string format");

        let err = Error::from(DecodeError::new(
            DecodeErrorKind::UnsupportedType(600),
            "unsupported type identifier: 600",
        ));
        assert_eq!(err.to_string(), "Decode error: unsupported type identifier: 600");
    }

    #[test]
    fn connection_flags() {
        let err = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Connect,
            message: "could not connect to server".to_string(),
        });
        assert!(err.is_connection_error());
        assert!(Error::Closed(Resource::Connection).is_connection_error());
        assert!(!Error::Closed(Resource::Statement).is_connection_error());
        assert_eq!(Error::Closed(Resource::ResultSet).to_string(), "result set is closed");
    }
}
