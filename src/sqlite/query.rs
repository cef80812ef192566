use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::Statement;

use crate::error::SqlHelperError;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlHelperError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlHelperError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

pub(crate) fn column_names(stmt: &Statement<'_>) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

/// Read every remaining row of an already-started query.
pub(crate) fn drain_rows(
    rows: &mut rusqlite::Rows<'_>,
    column_count: usize,
) -> Result<Vec<Vec<RowValues>>, SqlHelperError> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(sqlite_extract_value(row, i)?);
        }
        out.push(values);
    }
    Ok(out)
}

/// Bind `params` to the numbered slots of a statement that came out of a batch.
///
/// Each statement of a multi-statement command only sees the slots it
/// references, so binding goes by the statement's own parameter names.
pub(crate) fn bind_by_slot(stmt: &mut Statement<'_>, params: &[Value]) -> Result<(), SqlHelperError> {
    for idx in 1..=stmt.parameter_count() {
        let slot = stmt
            .parameter_name(idx)
            .and_then(|name| name.strip_prefix('?'))
            .and_then(|digits| digits.parse::<usize>().ok())
            .unwrap_or(idx);
        let value = params.get(slot - 1).ok_or_else(|| {
            SqlHelperError::ParameterError(format!(
                "statement references ?{slot} but only {} values were bound",
                params.len()
            ))
        })?;
        stmt.raw_bind_parameter(idx, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn builds_rows_with_storage_classes() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT 1 AS i, 2.5 AS f, 'x' AS t, NULL AS n, x'01' AS b")
            .unwrap();
        let columns = column_names(&stmt);
        assert_eq!(columns.as_slice(), ["i", "f", "t", "n", "b"]);
        let mut rows = stmt.raw_query();
        let values = drain_rows(&mut rows, columns.len()).unwrap();
        assert_eq!(
            values,
            vec![vec![
                RowValues::Int(1),
                RowValues::Float(2.5),
                RowValues::Text("x".into()),
                RowValues::Null,
                RowValues::Blob(vec![1]),
            ]]
        );
    }

    #[test]
    fn binds_sparse_slots() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?3, ?1").unwrap();
        bind_by_slot(
            &mut stmt,
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        let mut rows = stmt.raw_query();
        let values = drain_rows(&mut rows, 2).unwrap();
        assert_eq!(values, vec![vec![RowValues::Int(3), RowValues::Int(1)]]);
    }
}
