use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// Boxed error returned by instrumentation callbacks and carried by
/// [`SqlHelperError::CommandExecutionFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SqlHelperError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    /// A property-bag field held something other than a scalar.
    #[error("Unsupported parameter type for `{name}`: {kind}")]
    UnsupportedParameterType { name: String, kind: String },

    /// The SQL text references a placeholder that no parameter binds.
    #[error("No parameter bound for placeholder `{name}`")]
    MissingParameterBinding { name: String },

    /// The driver rejected the command. `params` is the JSON snapshot of the
    /// bound parameters (or `None` when there were none).
    #[error("Command failed: {source} (sql: {sql}, params: {})", .params.as_deref().unwrap_or("null"))]
    CommandExecutionFailed {
        sql: String,
        params: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("Cannot convert scalar {value} to {target}")]
    ScalarConversionFailed { target: &'static str, value: String },

    #[error("Cannot map column `{column}` (value {value}) to {target}")]
    RecordMappingFailed {
        target: &'static str,
        column: String,
        value: String,
    },

    #[error("Expected exactly one row, found {found}")]
    ExpectedExactlyOneRow { found: usize },

    #[error("A transaction is already active on this connection")]
    TransactionAlreadyActive,

    #[error("Connection already closed")]
    ConnectionClosed,

    #[error("Instrumentation callback failed: {0}")]
    Instrumentation(#[source] BoxError),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlHelperError {
    /// Whether this error came from the database driver itself.
    #[must_use]
    pub fn is_driver_error(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            SqlHelperError::PostgresError(_) => true,
            #[cfg(feature = "sqlite")]
            SqlHelperError::SqliteError(_) => true,
            _ => false,
        }
    }
}
