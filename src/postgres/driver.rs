use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, RowStream};

use super::params::Params;
use super::query::{build_result_set_from_statement, build_table_set, row_values, statement_columns};
use crate::driver::{Driver, RawCursor};
use crate::error::SqlHelperError;
use crate::params::Parameter;
use crate::results::{ResultSet, TableSet};
use crate::translation::PlaceholderStyle;
use crate::types::{DatabaseType, IsolationLevel, RowValues};

/// One `tokio-postgres` client driven by a private current-thread runtime.
///
/// The connection task only makes progress while a call is blocked on the
/// runtime, which is always the case while a command is in flight.
pub struct PostgresDriver {
    runtime: Runtime,
    client: Client,
    connection: JoinHandle<()>,
}

impl PostgresDriver {
    /// Connect with a URL (`postgres://...`) or libpq `key=value` string.
    ///
    /// # Errors
    /// Returns `SqlHelperError` if the runtime cannot start or the server refuses the connection.
    pub fn connect(conn_str: &str) -> Result<Self, SqlHelperError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlHelperError::ConnectionError(format!("cannot start runtime: {e}")))?;
        let (client, connection) = runtime.block_on(tokio_postgres::connect(conn_str, NoTls))?;
        let connection = runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed with error");
            }
        });
        Ok(Self {
            runtime,
            client,
            connection,
        })
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

/// `CALL name(a => :a, ...)`, left for the rewriter to number.
fn call_statement(name: &str, params: &[Parameter]) -> String {
    let args = params
        .iter()
        .map(|p| format!("{0} => :{0}", p.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CALL {name}({args})")
}

struct StreamingCursor<'a> {
    runtime: &'a Runtime,
    columns: Arc<Vec<String>>,
    stream: Pin<Box<RowStream>>,
}

impl RawCursor for StreamingCursor<'_> {
    fn columns(&self) -> &Arc<Vec<String>> {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlHelperError> {
        match self.runtime.block_on(self.stream.try_next())? {
            Some(row) => Ok(Some(row_values(&row)?)),
            None => Ok(None),
        }
    }
}

impl Driver for PostgresDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    fn set_command_timeout(&mut self, timeout: Duration) -> Result<(), SqlHelperError> {
        let sql = format!("SET statement_timeout = {}", timeout.as_millis());
        self.block_on(self.client.batch_execute(&sql))?;
        Ok(())
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), SqlHelperError> {
        let sql = match isolation {
            Some(level) => format!("BEGIN ISOLATION LEVEL {}", level.as_sql()),
            None => "BEGIN".to_string(),
        };
        self.block_on(self.client.batch_execute(&sql))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlHelperError> {
        self.block_on(self.client.batch_execute("COMMIT"))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SqlHelperError> {
        self.block_on(self.client.batch_execute("ROLLBACK"))?;
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlHelperError> {
        self.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    fn scalar(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<RowValues>, SqlHelperError> {
        let converted = Params::convert(params);
        let rows = self.block_on(self.client.query(sql, converted.as_refs()))?;
        match rows.first() {
            Some(row) if !row.is_empty() => {
                Ok(Some(super::query::postgres_extract_value(row, 0)?))
            }
            _ => Ok(None),
        }
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlHelperError> {
        if params.is_empty() {
            // Simple protocol so parameterless scripts with several statements work.
            let messages = self.block_on(self.client.simple_query(sql))?;
            let affected = messages
                .iter()
                .filter_map(|m| match m {
                    tokio_postgres::SimpleQueryMessage::CommandComplete(n) => Some(*n),
                    _ => None,
                })
                .sum::<u64>();
            return usize::try_from(affected)
                .map_err(|e| SqlHelperError::Other(format!("affected rows out of range: {e}")));
        }
        let converted = Params::convert(params);
        let rows = self.block_on(self.client.execute(sql, converted.as_refs()))?;
        usize::try_from(rows)
            .map_err(|e| SqlHelperError::Other(format!("affected rows out of range: {e}")))
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlHelperError> {
        let converted = Params::convert(params);
        let stmt = self.block_on(self.client.prepare(sql))?;
        let rows = self.block_on(self.client.query(&stmt, converted.as_refs()))?;
        build_result_set_from_statement(&stmt, &rows)
    }

    fn query_all(&mut self, sql: &str, params: &[RowValues]) -> Result<TableSet, SqlHelperError> {
        if params.is_empty() {
            let messages = self.block_on(self.client.simple_query(sql))?;
            return Ok(build_table_set(messages));
        }
        // The extended protocol runs one statement per round trip.
        let mut tables = TableSet::new();
        tables.push(self.query(sql, params)?);
        Ok(tables)
    }

    fn cursor<'a>(
        &'a mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RawCursor + 'a>, SqlHelperError> {
        let stmt = self.block_on(self.client.prepare(sql))?;
        let columns = statement_columns(&stmt);
        let stream = self.block_on(self.client.query_raw(&stmt, params.iter()))?;
        Ok(Box::new(StreamingCursor {
            runtime: &self.runtime,
            columns,
            stream: Box::pin(stream),
        }))
    }

    fn procedure_call(&self, name: &str, params: &[Parameter]) -> Result<String, SqlHelperError> {
        Ok(call_statement(name, params))
    }

    fn close(self: Box<Self>) -> Result<(), SqlHelperError> {
        let PostgresDriver {
            runtime,
            client,
            connection,
        } = *self;
        drop(client);
        runtime
            .block_on(connection)
            .map_err(|e| SqlHelperError::ConnectionError(format!("connection task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::rewrite;

    #[test]
    fn call_statement_binds_by_name() {
        let args = [Parameter::new("id", 1), Parameter::new("name", "x")];
        let call = call_statement("add_student", &args);
        assert_eq!(call, "CALL add_student(id => :id, name => :name)");

        let rewritten = rewrite(&call, &args, PlaceholderStyle::Postgres).unwrap();
        assert_eq!(rewritten.sql, "CALL add_student(id => $1, name => $2)");
    }

    #[test]
    fn call_statement_without_arguments() {
        assert_eq!(call_statement("refresh", &[]), "CALL refresh()");
    }
}
