// PostgreSQL backend
//
// - params: `ToSql` for `RowValues`
// - numeric: binary NUMERIC <-> `Decimal`
// - query: row extraction and result building
// - driver: the `Driver` implementation over one tokio-postgres client

pub mod driver;
pub mod numeric;
pub mod params;
pub mod query;

pub use driver::PostgresDriver;
pub use params::Params;
pub use query::{build_result_set_from_statement, postgres_extract_value};
