use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::{DisposePolicy, HelperOptions};
use crate::cursor::RowCursor;
use crate::decimal::Decimal;
use crate::driver::{self, Driver};
use crate::error::SqlHelperError;
use crate::executor::{self, Command, Prepared};
use crate::hooks::LogHooks;
use crate::mapping::{FromRow, FromValue};
use crate::params::{IntoParameters, Parameter};
use crate::results::{ResultSet, TableSet};
use crate::types::{CommandType, DatabaseType, IsolationLevel, RowValues};

/// One database connection plus the state of its current transaction.
///
/// Every call blocks until the driver returns. Parameters can be an explicit
/// `Vec<Parameter>`, positional `Vec<RowValues>`, a serializable property bag
/// wrapped in [`Bag`](crate::Bag), or `()` for none.
///
/// ```rust
/// use sql_helper::prelude::*;
///
/// # fn main() -> Result<(), SqlHelperError> {
/// let mut db = SqlHelper::open("sqlite::memory:")?;
/// db.execute_batch("CREATE TABLE student (id INTEGER, name TEXT);")?;
/// db.execute(
///     "INSERT INTO student (id, name) VALUES (@id, @name)",
///     Bag(serde_json::json!({ "id": 1, "name": "Ada" })),
/// )?;
/// let names: Vec<String> = db.query_list("SELECT name FROM student", ())?;
/// assert_eq!(names, ["Ada"]);
/// # Ok(())
/// # }
/// ```
pub struct SqlHelper {
    driver: Option<Box<dyn Driver>>,
    options: HelperOptions,
    in_transaction: bool,
    applied_timeout: Option<Duration>,
    last_parameters: Vec<Parameter>,
}

impl SqlHelper {
    /// Open a connection with default options.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if the connection string is not understood or
    /// the database cannot be opened.
    pub fn open(conn_str: &str) -> Result<Self, SqlHelperError> {
        Self::open_with(conn_str, HelperOptions::default())
    }

    /// # Errors
    /// Returns `SqlHelperError` if the connection string is not understood or
    /// the database cannot be opened.
    pub fn open_with(conn_str: &str, options: HelperOptions) -> Result<Self, SqlHelperError> {
        let driver = driver::connect(conn_str)?;
        tracing::debug!(database = ?driver.database_type(), "opened connection");
        Ok(Self::from_driver(driver, options))
    }

    /// Wrap an already-open driver.
    #[must_use]
    pub fn from_driver(driver: Box<dyn Driver>, options: HelperOptions) -> Self {
        Self {
            driver: Some(driver),
            options,
            in_transaction: false,
            applied_timeout: None,
            last_parameters: Vec::new(),
        }
    }

    /// Close the connection, resolving an open transaction by the dispose
    /// policy. Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns the error from resolving the transaction or closing the driver.
    /// The connection is closed either way.
    pub fn close(&mut self) -> Result<(), SqlHelperError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SqlHelperError> {
        let Some(mut driver) = self.driver.take() else {
            return Ok(());
        };
        let resolved = if self.in_transaction {
            self.in_transaction = false;
            match self.options.command.dispose_policy {
                DisposePolicy::Rollback => driver.rollback(),
                DisposePolicy::Commit => driver.commit(),
            }
        } else {
            Ok(())
        };
        let closed = driver.close();
        resolved.and(closed)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    #[must_use]
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.driver.as_ref().map(|d| d.database_type())
    }

    #[must_use]
    pub fn options(&self) -> &HelperOptions {
        &self.options
    }

    pub fn logging_mut(&mut self) -> &mut LogHooks {
        &mut self.options.logging
    }

    pub fn set_command_type(&mut self, command_type: CommandType) {
        self.options.command.command_type = command_type;
    }

    pub fn set_command_timeout_secs(&mut self, secs: u64) {
        self.options.command.command_timeout_secs = secs;
    }

    pub fn set_clear_parameters(&mut self, clear: bool) {
        self.options.command.clear_parameters = clear;
        if clear {
            self.last_parameters.clear();
        }
    }

    /// Parameters bound by the last command, kept only while
    /// `clear_parameters` is off.
    #[must_use]
    pub fn last_parameters(&self) -> &[Parameter] {
        &self.last_parameters
    }

    /// The underlying driver, `None` once closed.
    ///
    /// Statements run here bypass parameter rewriting, the log hooks and
    /// transaction tracking.
    pub fn driver_mut(&mut self) -> Option<&mut (dyn Driver + 'static)> {
        self.driver.as_deref_mut()
    }

    fn open_driver(&mut self) -> Result<&mut (dyn Driver + 'static), SqlHelperError> {
        self.driver_mut().ok_or(SqlHelperError::ConnectionClosed)
    }

    // ----- transactions -----

    /// # Errors
    /// Returns `TransactionAlreadyActive` if one is open, or the driver's error.
    pub fn begin_transaction(&mut self) -> Result<(), SqlHelperError> {
        self.begin(None)
    }

    /// # Errors
    /// Returns `TransactionAlreadyActive` if one is open, or the driver's error.
    pub fn begin_transaction_with(&mut self, isolation: IsolationLevel) -> Result<(), SqlHelperError> {
        self.begin(Some(isolation))
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), SqlHelperError> {
        if self.in_transaction {
            return Err(SqlHelperError::TransactionAlreadyActive);
        }
        self.open_driver()?.begin(isolation)?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the active transaction; no-op without one.
    ///
    /// # Errors
    /// Returns the driver's error; the transaction stays active.
    pub fn commit(&mut self) -> Result<(), SqlHelperError> {
        if !self.in_transaction {
            return Ok(());
        }
        if let Err(e) = self.open_driver()?.commit() {
            // A failed COMMIT may have rolled back session settings.
            self.applied_timeout = None;
            return Err(e);
        }
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the active transaction; no-op without one.
    ///
    /// # Errors
    /// Returns the driver's error; the transaction stays active.
    pub fn rollback(&mut self) -> Result<(), SqlHelperError> {
        if !self.in_transaction {
            return Ok(());
        }
        // Postgres undoes a SET issued inside the transaction.
        self.applied_timeout = None;
        self.open_driver()?.rollback()?;
        self.in_transaction = false;
        Ok(())
    }

    // ----- execution -----

    fn run_command<'s, T>(
        &'s mut self,
        sql: &str,
        params: impl IntoParameters,
        op: impl FnOnce(&'s mut dyn Driver, &str, &[RowValues]) -> Result<T, SqlHelperError>,
    ) -> Result<T, SqlHelperError> {
        let command = Command::new(sql, params, &self.options.command)?;
        let driver = self
            .driver
            .as_deref_mut()
            .ok_or(SqlHelperError::ConnectionClosed)?;
        let ambient = if self.options.command.auto_fill_ambient_parameters {
            self.options.ambient.as_deref()
        } else {
            None
        };

        let prepared = match executor::prepare(&*driver, command, ambient) {
            Ok(p) => p,
            Err(e) => {
                self.last_parameters.clear();
                return Err(e);
            }
        };
        let clear = self.options.command.clear_parameters;
        if self.applied_timeout != Some(prepared.timeout) {
            if let Err(e) = driver.set_command_timeout(prepared.timeout) {
                let err = executor::wrap_driver_error(e, &prepared);
                self.last_parameters = retained(clear, prepared.bound);
                return Err(err);
            }
            self.applied_timeout = Some(prepared.timeout);
        }

        let result = executor::run(driver, &mut self.options.logging, &prepared, op);
        self.last_parameters = retained(clear, prepared.bound);
        result
    }

    /// Run a parameterless script, such as schema setup.
    ///
    /// # Errors
    /// Returns `CommandExecutionFailed` if any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHelperError> {
        let driver = self
            .driver
            .as_deref_mut()
            .ok_or(SqlHelperError::ConnectionClosed)?;
        let prepared = Prepared {
            sql: sql.to_string(),
            bound: Vec::new(),
            values: Vec::new(),
            payload: None,
            timeout: self.options.command.command_timeout(),
        };
        executor::run(driver, &mut self.options.logging, &prepared, |d, sql, _| {
            d.execute_batch(sql)
        })
    }

    /// Run a command and return the number of affected rows.
    ///
    /// # Errors
    /// Returns parameter, rewrite, driver or hook errors.
    pub fn execute(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<usize, SqlHelperError> {
        self.run_command(sql, params, |d, sql, values| d.execute(sql, values))
    }

    /// First column of the first row; `Int(0)` when there is no row or the value is NULL.
    ///
    /// # Errors
    /// Returns parameter, rewrite, driver or hook errors.
    pub fn scalar(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<RowValues, SqlHelperError> {
        let value = self.run_command(sql, params, |d, sql, values| d.scalar(sql, values))?;
        Ok(match value {
            None | Some(RowValues::Null) => RowValues::Int(0),
            Some(v) => v,
        })
    }

    fn scalar_as<T: FromValue>(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<T, SqlHelperError> {
        let value = self.scalar(sql, params)?;
        T::from_value(&value).ok_or_else(|| SqlHelperError::ScalarConversionFailed {
            target: T::TARGET,
            value: value.describe(),
        })
    }

    /// Scalar as text; NULL or no row gives an empty string.
    ///
    /// # Errors
    /// Returns `ScalarConversionFailed` for values without a text form.
    pub fn get_string(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<String, SqlHelperError> {
        let value = self
            .run_command(sql, params, |d, sql, values| d.scalar(sql, values))?
            .unwrap_or(RowValues::Null);
        if value.is_null() {
            return Ok(String::new());
        }
        String::from_value(&value).ok_or_else(|| SqlHelperError::ScalarConversionFailed {
            target: String::TARGET,
            value: value.describe(),
        })
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not an integer in range.
    pub fn get_int(&mut self, sql: &str, params: impl IntoParameters) -> Result<i32, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not an integer.
    pub fn get_long(&mut self, sql: &str, params: impl IntoParameters) -> Result<i64, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not numeric.
    pub fn get_double(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<f64, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not numeric.
    pub fn get_decimal(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<Decimal, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not a timestamp (including NULL).
    pub fn get_date_time(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<NaiveDateTime, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// # Errors
    /// Returns `ScalarConversionFailed` if the value is not boolean-like.
    pub fn get_bool(&mut self, sql: &str, params: impl IntoParameters) -> Result<bool, SqlHelperError> {
        self.scalar_as(sql, params)
    }

    /// Open a forward-only cursor. The helper stays borrowed until it is dropped.
    ///
    /// # Errors
    /// Returns parameter, rewrite, driver or hook errors.
    pub fn query_cursor(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<RowCursor<'_>, SqlHelperError> {
        let raw = self.run_command(sql, params, |d, sql, values| d.cursor(sql, values))?;
        Ok(RowCursor::new(raw))
    }

    /// Whole result of the first row-returning statement.
    ///
    /// # Errors
    /// Returns parameter, rewrite, driver or hook errors.
    pub fn query_table(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<ResultSet, SqlHelperError> {
        self.run_command(sql, params, |d, sql, values| d.query(sql, values))
    }

    /// One table per row-returning statement, named `Table`, `Table1`, ...
    ///
    /// # Errors
    /// Returns parameter, rewrite, driver or hook errors.
    pub fn query_tables(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<TableSet, SqlHelperError> {
        self.run_command(sql, params, |d, sql, values| d.query_all(sql, values))
    }

    /// Every row mapped to `T`, in result order.
    ///
    /// # Errors
    /// Returns execution errors or `RecordMappingFailed`.
    pub fn query_list<T: FromRow>(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<Vec<T>, SqlHelperError> {
        self.query_table(sql, params)?.into_list()
    }

    /// The only row mapped to `T`.
    ///
    /// # Errors
    /// Returns `ExpectedExactlyOneRow` unless exactly one row came back.
    pub fn query_single<T: FromRow>(
        &mut self,
        sql: &str,
        params: impl IntoParameters,
    ) -> Result<T, SqlHelperError> {
        let table = self.query_table(sql, params)?;
        if table.len() != 1 {
            return Err(SqlHelperError::ExpectedExactlyOneRow { found: table.len() });
        }
        table
            .into_list()?
            .pop()
            .ok_or(SqlHelperError::ExpectedExactlyOneRow { found: 0 })
    }
}

fn retained(clear: bool, bound: Vec<Parameter>) -> Vec<Parameter> {
    if clear { Vec::new() } else { bound }
}

impl Drop for SqlHelper {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "connection did not close cleanly");
        }
    }
}

impl std::fmt::Debug for SqlHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlHelper")
            .field("database_type", &self.database_type())
            .field("in_transaction", &self.in_transaction)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
