//! Query execution against Redshift/PostgreSQL.
//!
//! ```text
//!   build_query() ──SQL──▶ RowSource ──ResultRow──▶ map_row()
//!                              │
//!              ┌───────────────┴───────────────┐
//!       ┌──────▼─────────┐              ┌──────▼──────┐
//!       │ PostgresSource │              │ MockSource  │
//!       │ (live session) │              │ (testing)   │
//!       └────────────────┘              └─────────────┘
//! ```

pub mod mock;
mod pg_source;
mod traits;

use std::fmt;

pub use mock::MockSource;
pub use pg_source::PostgresSource;
pub use traits::RowSource;

/// Default Redshift port.
pub const DEFAULT_PORT: u16 = 5439;

/// TLS negotiation policy, named after libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    Prefer,
    #[default]
    Require,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }
}

/// Connection parameters for the monitored database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub sslmode: SslMode,
    /// Seconds; `None` leaves the driver default.
    pub connect_timeout: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            database: None,
            sslmode: SslMode::default(),
            connect_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Key/value connection string understood by `postgres::Config`.
    pub fn connection_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, redact: bool) -> String {
        let mut parts = vec![
            format!("host={}", quote(&self.host)),
            format!("port={}", self.port),
        ];
        if let Some(user) = non_empty(&self.user) {
            parts.push(format!("user={}", quote(user)));
        }
        if let Some(database) = non_empty(&self.database) {
            parts.push(format!("dbname={}", quote(database)));
        }
        if let Some(password) = non_empty(&self.password) {
            if redact {
                parts.push("password=***".to_string());
            } else {
                parts.push(format!("password={}", quote(password)));
            }
        }
        parts.push(format!("sslmode={}", self.sslmode.as_str()));
        if let Some(timeout) = self.connect_timeout {
            parts.push(format!("connect_timeout={}", timeout));
        }
        parts.join(" ")
    }
}

/// Connection string with the password masked, for logs.
impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Quotes a connection-string value when it contains spaces, quotes or backslashes.
fn quote(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Shortens driver errors to the part worth logging.
///
/// Server-side errors keep their SQLSTATE so permission and missing-relation
/// failures can be told apart in the agent log.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    match e.as_db_error() {
        Some(db_error) => format!(
            "{} {}: {}",
            db_error.severity(),
            db_error.code().code(),
            db_error.message()
        ),
        None => summarize_client_error(&e.to_string()),
    }
}

/// Client-side failures (socket, TLS, startup) collapse to a short reason.
fn summarize_client_error(msg: &str) -> String {
    if msg.contains("Connection refused") {
        "connection refused".to_string()
    } else if msg.contains("timed out") {
        "connection timed out".to_string()
    } else if msg.contains("password authentication failed") {
        "password authentication failed".to_string()
    } else if msg.contains("TLS") || msg.contains("tls") {
        format!("TLS negotiation failed: {}", msg)
    } else if let Some((_, reason)) = msg.rsplit_once("FATAL:") {
        reason.trim().to_string()
    } else {
        msg.to_string()
    }
}
