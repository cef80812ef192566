//! Materialized query results.

mod result_set;
mod row;
mod table_set;

pub use result_set::ResultSet;
pub use row::CustomDbRow;
pub(crate) use row::build_index_cache;
pub use table_set::TableSet;
