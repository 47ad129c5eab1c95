//! PostgreSQL connection configuration.
//!
//! libpq parses the connection string itself; this module only renders one
//! from typed settings. Strings that are already in conninfo form can be
//! handed to [`PgConnection::open`](crate::PgConnection::open) directly.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SSL mode for PostgreSQL connections, spelled as libpq expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Do not use SSL
    Disable,
    /// Try non-SSL first, fall back to SSL
    Allow,
    /// Try SSL, fall back to non-SSL if unavailable
    #[default]
    Prefer,
    /// Require SSL connection
    Require,
    /// Require SSL and verify server certificate
    VerifyCa,
    /// Require SSL and verify server certificate matches hostname
    VerifyFull,
}

impl SslMode {
    /// The libpq `sslmode` keyword value.
    pub const fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }

    /// Check if SSL is required.
    pub const fn is_required(self) -> bool {
        matches!(
            self,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull
        )
    }
}

/// PostgreSQL connection configuration.
///
/// Empty strings and `None` leave the setting to libpq's own defaults and
/// environment variables (`PGHOST`, `PGUSER`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgConfig {
    /// Hostname, IP address or socket directory
    pub host: String,
    /// Port number (default: 5432)
    pub port: u16,
    /// Username for authentication
    pub user: String,
    /// Password for authentication (optional for trust auth)
    pub password: Option<String>,
    /// Database name to connect to
    pub dbname: String,
    /// Application name (visible in pg_stat_activity)
    pub application_name: Option<String>,
    /// Connection timeout, rounded down to whole seconds
    pub connect_timeout: Duration,
    /// SSL mode
    pub ssl_mode: SslMode,
    /// Additional conninfo keywords
    pub options: BTreeMap<String, String>,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: String::new(),
            password: None,
            dbname: String::new(),
            application_name: None,
            connect_timeout: Duration::from_secs(30),
            ssl_mode: SslMode::default(),
            options: BTreeMap::new(),
        }
    }
}

impl PgConfig {
    /// Create a new configuration with the given connection string components.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            dbname: dbname.into(),
            ..Default::default()
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the SSL mode.
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    /// Set an additional conninfo keyword.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Render a libpq `keyword=value` connection string.
    pub fn to_conninfo(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if !self.host.is_empty() {
            pairs.push(("host", self.host.clone()));
        }
        pairs.push(("port", self.port.to_string()));
        if !self.user.is_empty() {
            pairs.push(("user", self.user.clone()));
        }
        if let Some(password) = &self.password {
            pairs.push(("password", password.clone()));
        }
        if !self.dbname.is_empty() {
            pairs.push(("dbname", self.dbname.clone()));
        }
        if let Some(app_name) = &self.application_name {
            pairs.push(("application_name", app_name.clone()));
        }
        if !self.connect_timeout.is_zero() {
            // libpq treats anything below 2 seconds as 2
            pairs.push(("connect_timeout", self.connect_timeout.as_secs().to_string()));
        }
        pairs.push(("sslmode", self.ssl_mode.as_str().to_string()));

        for (key, value) in &self.options {
            pairs.push((key.as_str(), value.clone()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", quote_conninfo_value(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote a conninfo value when libpq would otherwise misread it.
fn quote_conninfo_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_conninfo() {
        let config = PgConfig::default();
        assert_eq!(
            config.to_conninfo(),
            "host=localhost port=5432 connect_timeout=30 sslmode=prefer"
        );
    }

    #[test]
    fn test_builder_conninfo() {
        let config = PgConfig::new("db.internal", "app", "orders")
            .port(6543)
            .password("s3cret")
            .application_name("order service")
            .connect_timeout(Duration::from_secs(5))
            .ssl_mode(SslMode::VerifyFull)
            .option("options", "-c search_path=app");

        assert_eq!(
            config.to_conninfo(),
            "host=db.internal port=6543 user=app password=s3cret dbname=orders \
             application_name='order service' connect_timeout=5 sslmode=verify-full \
             options='-c search_path=app'"
        );
        assert!(config.ssl_mode.is_required());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_conninfo_value("plain"), "plain");
        assert_eq!(quote_conninfo_value(""), "''");
        assert_eq!(quote_conninfo_value("it's"), r"'it\'s'");
        assert_eq!(quote_conninfo_value(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: PgConfig = serde_json::from_str(
            r#"{"host": "/var/run/postgresql", "user": "postgres", "ssl_mode": "verify-ca"}"#,
        )
        .unwrap();
        assert_eq!(config.host, "/var/run/postgresql");
        assert_eq!(config.port, 5432);
        assert_eq!(config.ssl_mode, SslMode::VerifyCa);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }
}
