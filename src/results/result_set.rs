use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_index_cache};
use crate::error::SqlHelperError;
use crate::mapping::FromRow;
use crate::types::RowValues;

/// A fully materialized result of a query.
///
/// Returned by `query_table`; each statement of a `query_tables` call produces one.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index_cache: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(build_index_cache(&column_names));
        self.column_names = Some(column_names);
    }

    /// Column names, empty when the statement produced no columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.column_names.as_ref().map_or(&[], |c| c.as_slice())
    }

    /// Add a row to the result set
    ///
    /// Rows added before the column names are known are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }

    /// Map every row to `T` with the same rules as `query_list`.
    ///
    /// # Errors
    /// Returns `SqlHelperError::RecordMappingFailed` if a value cannot be converted.
    pub fn to_list<T: FromRow>(&self) -> Result<Vec<T>, SqlHelperError> {
        let plan = T::plan(self.columns())?;
        self.results
            .iter()
            .map(|row| T::from_row(&plan, self.columns(), row.rows.clone()))
            .collect()
    }

    /// Consuming form of [`to_list`](Self::to_list).
    ///
    /// # Errors
    /// Returns `SqlHelperError::RecordMappingFailed` if a value cannot be converted.
    pub fn into_list<T: FromRow>(self) -> Result<Vec<T>, SqlHelperError> {
        let columns = self.column_names.unwrap_or_default();
        let plan = T::plan(&columns)?;
        self.results
            .into_iter()
            .map(|row| T::from_row(&plan, &columns, row.rows))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
