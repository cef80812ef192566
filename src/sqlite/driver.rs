use std::sync::Arc;
use std::time::Duration;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::types::Value;
use rusqlite::{Batch, Connection, OpenFlags};

use super::params::Params;
use super::query::{bind_by_slot, column_names, drain_rows};
use crate::driver::{Driver, RawCursor};
use crate::error::SqlHelperError;
use crate::params::Parameter;
use crate::results::{ResultSet, TableSet};
use crate::translation::PlaceholderStyle;
use crate::types::{DatabaseType, IsolationLevel, RowValues};

/// A single `rusqlite` connection.
#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Open `target`: `:memory:`, a `file:` URI, or a filesystem path.
    ///
    /// File-backed databases are switched to WAL journaling.
    ///
    /// # Errors
    /// Returns `SqlHelperError::SqliteError` if the database cannot be opened.
    pub fn open(target: &str) -> Result<Self, SqlHelperError> {
        let conn = if target == ":memory:" {
            Connection::open_in_memory()?
        } else if target.starts_with("file:") {
            Connection::open_with_flags(target, OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI)?
        } else {
            Connection::open(target)?
        };

        let in_memory = target == ":memory:" || target.contains("mode=memory");
        if !in_memory {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(target, journal_mode = %mode, "opened sqlite database");
        }
        Ok(Self { conn })
    }

    /// Wrap a connection the caller already opened.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Run every statement of `sql` in order, handing each result table to `on_table`.
    ///
    /// Returns the number of rows changed by statements that write.
    fn run_statements(
        &self,
        sql: &str,
        params: &[Value],
        mut on_table: impl FnMut(Arc<Vec<String>>, Vec<Vec<RowValues>>),
    ) -> Result<usize, SqlHelperError> {
        let mut batch = Batch::new(&self.conn, sql);
        let mut affected = 0;
        while let Some(mut stmt) = batch.next()? {
            bind_by_slot(&mut stmt, params)?;
            if stmt.column_count() == 0 {
                // sqlite3_changes() keeps the last DML count across DDL.
                let before = self.conn.total_changes();
                let changed = stmt.raw_execute()?;
                if self.conn.total_changes() != before {
                    affected += changed;
                }
                continue;
            }

            let columns = column_names(&stmt);
            let values = {
                let mut rows = stmt.raw_query();
                drain_rows(&mut rows, columns.len())?
            };
            // INSERT ... RETURNING
            if !stmt.readonly() {
                affected += values.len();
            }
            on_table(columns, values);
        }
        Ok(affected)
    }
}

struct BufferedCursor {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<Vec<RowValues>>,
}

impl RawCursor for BufferedCursor {
    fn columns(&self) -> &Arc<Vec<String>> {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlHelperError> {
        Ok(self.rows.next())
    }
}

fn to_result_set(columns: Arc<Vec<String>>, rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(columns);
    for values in rows {
        rs.add_row_values(values);
    }
    rs
}

impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    fn set_command_timeout(&mut self, timeout: Duration) -> Result<(), SqlHelperError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), SqlHelperError> {
        // SQLite transactions are always serializable; the level only decides
        // whether the write lock is taken up front.
        let sql = match isolation {
            Some(IsolationLevel::Serializable) => "BEGIN IMMEDIATE",
            _ => "BEGIN DEFERRED",
        };
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlHelperError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlHelperError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHelperError> {
        self.run_statements(sql, &[], |_, _| {})?;
        Ok(())
    }

    fn scalar(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<RowValues>, SqlHelperError> {
        let params = Params::convert(params);
        let mut first: Option<Option<RowValues>> = None;
        self.run_statements(sql, params.as_values(), |_, rows| {
            if first.is_none() {
                first = Some(rows.into_iter().next().and_then(|r| r.into_iter().next()));
            }
        })?;
        Ok(first.flatten())
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlHelperError> {
        let params = Params::convert(params);
        self.run_statements(sql, params.as_values(), |_, _| {})
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlHelperError> {
        Ok(self.query_all(sql, params)?.into_first().unwrap_or_default())
    }

    fn query_all(&mut self, sql: &str, params: &[RowValues]) -> Result<TableSet, SqlHelperError> {
        let params = Params::convert(params);
        let mut tables = TableSet::new();
        self.run_statements(sql, params.as_values(), |columns, rows| {
            tables.push(to_result_set(columns, rows));
        })?;
        Ok(tables)
    }

    fn cursor<'a>(
        &'a mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RawCursor + 'a>, SqlHelperError> {
        // rusqlite rows borrow their statement, so the first table is read up front.
        let params = Params::convert(params);
        let mut first: Option<(Arc<Vec<String>>, Vec<Vec<RowValues>>)> = None;
        self.run_statements(sql, params.as_values(), |columns, rows| {
            if first.is_none() {
                first = Some((columns, rows));
            }
        })?;
        let (columns, rows) = first.unwrap_or_default();
        Ok(Box::new(BufferedCursor {
            columns,
            rows: rows.into_iter(),
        }))
    }

    fn procedure_call(&self, name: &str, _params: &[Parameter]) -> Result<String, SqlHelperError> {
        Err(SqlHelperError::Unimplemented(format!(
            "SQLite has no stored procedures (called `{name}`)"
        )))
    }

    fn close(self: Box<Self>) -> Result<(), SqlHelperError> {
        self.conn.close().map_err(|(_, e)| SqlHelperError::SqliteError(e))
    }
}
