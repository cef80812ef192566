//! The seam between the helper and a concrete database client.
//!
//! A [`Driver`] owns one live connection. Every method receives SQL that has
//! already been rewritten into the driver's [`PlaceholderStyle`] and the values
//! in binding order.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::error::SqlHelperError;
use crate::params::Parameter;
use crate::results::{ResultSet, TableSet};
use crate::translation::PlaceholderStyle;
use crate::types::{DatabaseType, IsolationLevel, RowValues};

/// Forward-only row source handed out by [`Driver::cursor`].
pub trait RawCursor {
    fn columns(&self) -> &Arc<Vec<String>>;

    /// Next row in result order, or `None` once exhausted.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if fetching the row fails.
    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlHelperError>;
}

pub trait Driver: Send {
    fn database_type(&self) -> DatabaseType;

    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Bound how long one command may run (or wait for locks, for `SQLite`).
    ///
    /// # Errors
    /// Returns `SqlHelperError` if the driver rejects the setting.
    fn set_command_timeout(&mut self, timeout: Duration) -> Result<(), SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if the transaction cannot be started.
    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if committing fails.
    fn commit(&mut self) -> Result<(), SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if rolling back fails.
    fn rollback(&mut self) -> Result<(), SqlHelperError>;

    /// Run a parameterless script.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if any statement fails.
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHelperError>;

    /// First column of the first row, `None` when no row came back.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if execution fails.
    fn scalar(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<RowValues>, SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if execution fails.
    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if execution fails.
    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlHelperError>;

    /// One table per statement that returns columns.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if any statement fails.
    fn query_all(&mut self, sql: &str, params: &[RowValues]) -> Result<TableSet, SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError` if execution fails.
    fn cursor<'a>(
        &'a mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RawCursor + 'a>, SqlHelperError>;

    /// SQL that calls procedure `name` with `params` bound by name.
    ///
    /// # Errors
    /// Returns `SqlHelperError::Unimplemented` for backends without procedures.
    fn procedure_call(&self, name: &str, params: &[Parameter]) -> Result<String, SqlHelperError>;

    /// Close the connection.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if the driver reports a failure while closing.
    fn close(self: Box<Self>) -> Result<(), SqlHelperError>;
}

static LIBPQ_KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(host|hostaddr|dbname|user|port|password)\s*=").expect("static regex")
});

/// Backend implied by a connection string, and the target the backend should open.
///
/// | input | backend |
/// |---|---|
/// | `sqlite::memory:`, `:memory:` | `SQLite`, in memory |
/// | `sqlite://path`, `sqlite:path`, `file:...`, `*.db`, `*.sqlite`, `*.sqlite3` | `SQLite` |
/// | `postgres://...`, `postgresql://...`, `host=... user=...` | `PostgreSQL` |
///
/// # Errors
/// Returns `SqlHelperError::ConfigError` when the string matches no enabled backend.
pub fn resolve_connection_string(
    conn_str: &str,
) -> Result<(DatabaseType, String), SqlHelperError> {
    let trimmed = conn_str.trim();
    if trimmed.is_empty() {
        return Err(SqlHelperError::ConfigError("empty connection string".into()));
    }

    if trimmed.starts_with("postgres://")
        || trimmed.starts_with("postgresql://")
        || LIBPQ_KEY_VALUE.is_match(trimmed)
    {
        #[cfg(feature = "postgres")]
        return Ok((DatabaseType::Postgres, trimmed.to_string()));
        #[cfg(not(feature = "postgres"))]
        return Err(SqlHelperError::ConfigError(
            "PostgreSQL connection string given but the `postgres` feature is disabled".into(),
        ));
    }

    let sqlite_target = if trimmed == "sqlite::memory:" || trimmed == ":memory:" {
        Some(":memory:".to_string())
    } else if let Some(path) = trimmed.strip_prefix("sqlite://") {
        Some(path.to_string())
    } else if let Some(path) = trimmed.strip_prefix("sqlite:") {
        Some(path.to_string())
    } else if trimmed.starts_with("file:")
        || [".db", ".sqlite", ".sqlite3"]
            .iter()
            .any(|ext| trimmed.ends_with(ext))
    {
        Some(trimmed.to_string())
    } else {
        None
    };

    match sqlite_target {
        #[cfg(feature = "sqlite")]
        Some(target) => Ok((DatabaseType::Sqlite, target)),
        #[cfg(not(feature = "sqlite"))]
        Some(_) => Err(SqlHelperError::ConfigError(
            "SQLite connection string given but the `sqlite` feature is disabled".into(),
        )),
        None => Err(SqlHelperError::ConfigError(format!(
            "unrecognized connection string: {trimmed}"
        ))),
    }
}

/// Open the driver selected by `conn_str`.
///
/// # Errors
/// Returns `SqlHelperError` if the string is not understood or connecting fails.
pub fn connect(conn_str: &str) -> Result<Box<dyn Driver>, SqlHelperError> {
    let (db_type, target) = resolve_connection_string(conn_str)?;
    match db_type {
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => Ok(Box::new(crate::sqlite::SqliteDriver::open(&target)?)),
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => Ok(Box::new(crate::postgres::PostgresDriver::connect(
            &target,
        )?)),
    }
}
