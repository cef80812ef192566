use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::RawCursor;
use crate::error::SqlHelperError;
use crate::mapping::FromRow;
use crate::results::CustomDbRow;
use crate::results::build_index_cache;

/// Forward-only reader over the rows of one query.
///
/// Holds the helper mutably borrowed; dropping the cursor releases the
/// statement. Iterating yields `Result<CustomDbRow, _>`.
pub struct RowCursor<'a> {
    inner: Box<dyn RawCursor + 'a>,
    index_cache: Arc<HashMap<String, usize>>,
    finished: bool,
}

impl<'a> RowCursor<'a> {
    pub(crate) fn new(inner: Box<dyn RawCursor + 'a>) -> Self {
        let index_cache = build_index_cache(inner.columns());
        Self {
            inner,
            index_cache,
            finished: false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    /// # Errors
    /// Returns `SqlHelperError` if the driver fails while fetching.
    pub fn next_row(&mut self) -> Result<Option<CustomDbRow>, SqlHelperError> {
        if self.finished {
            return Ok(None);
        }
        match self.inner.next_row()? {
            Some(values) => Ok(Some(CustomDbRow {
                column_names: Arc::clone(self.inner.columns()),
                rows: values,
                column_index_cache: Arc::clone(&self.index_cache),
            })),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Read the remaining rows as `T`.
    ///
    /// # Errors
    /// Returns the first fetch or mapping error.
    pub fn collect_as<T: FromRow>(mut self) -> Result<Vec<T>, SqlHelperError> {
        let columns = Arc::clone(self.inner.columns());
        let plan = T::plan(&columns)?;
        let mut out = Vec::new();
        while let Some(row) = self.next_row()? {
            out.push(T::from_row(&plan, &columns, row.rows)?);
        }
        Ok(out)
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<CustomDbRow, SqlHelperError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    struct Fixed {
        columns: Arc<Vec<String>>,
        rows: Vec<Vec<RowValues>>,
    }

    impl RawCursor for Fixed {
        fn columns(&self) -> &Arc<Vec<String>> {
            &self.columns
        }

        fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlHelperError> {
            if self.rows.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.rows.remove(0)))
            }
        }
    }

    fn cursor() -> RowCursor<'static> {
        RowCursor::new(Box::new(Fixed {
            columns: Arc::new(vec!["id".into(), "name".into()]),
            rows: vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Text("b".into())],
            ],
        }))
    }

    #[test]
    fn iterates_rows_by_name() {
        let names: Vec<String> = cursor()
            .map(|row| row.unwrap().get("NAME").unwrap().as_text().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn collects_typed_rows() {
        let pairs: Vec<(i64, String)> = cursor().collect_as().unwrap();
        assert_eq!(pairs, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[test]
    fn stays_exhausted() {
        let mut c = cursor();
        assert!(c.next_row().unwrap().is_some());
        assert!(c.next_row().unwrap().is_some());
        assert!(c.next_row().unwrap().is_none());
        assert!(c.next_row().unwrap().is_none());
    }
}
