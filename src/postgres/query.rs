use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::{Row, SimpleQueryMessage, Statement};

use super::numeric::PgNumeric;
use crate::error::SqlHelperError;
use crate::results::{ResultSet, TableSet};
use crate::types::RowValues;

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `SqlHelperError` if the column cannot be retrieved.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlHelperError> {
    let type_info = row.columns()[idx].type_();

    let value = match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            val.map(|v| RowValues::Int(i64::from(v)))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            val.map(|v| RowValues::Int(i64::from(v)))
        }
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            val.map(|v| RowValues::Float(f64::from(v)))
        }
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        "numeric" => {
            let val: Option<PgNumeric> = row.try_get(idx)?;
            val.map(|v| RowValues::Text(v.0.to_string()))
        }
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            val.map(|v| RowValues::Timestamp(v.naive_utc()))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx)?;
            val.map(|v| RowValues::Timestamp(v.and_time(chrono::NaiveTime::MIN)))
        }
        "json" | "jsonb" => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        // text, varchar, bpchar, name and anything else readable as a string
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

pub(crate) fn row_values(row: &Row) -> Result<Vec<RowValues>, SqlHelperError> {
    (0..row.columns().len())
        .map(|idx| postgres_extract_value(row, idx))
        .collect()
}

pub(crate) fn statement_columns(stmt: &Statement) -> Arc<Vec<String>> {
    Arc::new(
        stmt.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    )
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[Row],
) -> Result<ResultSet, SqlHelperError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(statement_columns(stmt));
    for row in rows {
        result_set.add_row_values(row_values(row)?);
    }
    Ok(result_set)
}

/// Split simple-protocol output into one table per row-returning statement.
///
/// The simple protocol carries every value as text.
#[must_use]
pub fn build_table_set(messages: Vec<SimpleQueryMessage>) -> TableSet {
    let mut tables = TableSet::new();
    let mut current: Option<ResultSet> = None;
    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                if let Some(done) = current.take() {
                    tables.push(done);
                }
                let names = columns.iter().map(|c| c.name().to_string()).collect();
                let mut rs = ResultSet::with_capacity(0);
                rs.set_column_names(Arc::new(names));
                current = Some(rs);
            }
            SimpleQueryMessage::Row(row) => {
                if let Some(rs) = current.as_mut() {
                    let values = (0..row.len())
                        .map(|i| {
                            row.get(i)
                                .map_or(RowValues::Null, |s| RowValues::Text(s.to_string()))
                        })
                        .collect();
                    rs.add_row_values(values);
                }
            }
            SimpleQueryMessage::CommandComplete(_) => {
                if let Some(done) = current.take() {
                    tables.push(done);
                }
            }
            _ => {}
        }
    }
    if let Some(done) = current {
        tables.push(done);
    }
    tables
}
