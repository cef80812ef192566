//! Parameterized command execution and result materialization.
//!
//! [`SqlHelper`] owns one connection (SQLite through `rusqlite`, PostgreSQL
//! through `tokio-postgres` behind the `postgres` feature) and turns SQL text
//! with named placeholders plus caller parameters into scalars, typed records
//! or whole tables:
//!
//! ```rust
//! use sql_helper::prelude::*;
//!
//! sql_helper::record! {
//!     #[derive(Debug, Default)]
//!     pub struct Student {
//!         pub id: i64,
//!         pub name: String,
//!     }
//! }
//!
//! # fn main() -> Result<(), SqlHelperError> {
//! let mut db = SqlHelper::open("sqlite::memory:")?;
//! db.execute_batch("CREATE TABLE student (id INTEGER PRIMARY KEY, name TEXT);")?;
//!
//! db.begin_transaction()?;
//! db.execute(
//!     "INSERT INTO student (id, name) VALUES (@id, @name)",
//!     vec![Parameter::new("id", 1), Parameter::new("name", "Ada")],
//! )?;
//! db.commit()?;
//!
//! let student: Student = db.query_single(
//!     "SELECT * FROM student WHERE id = :id",
//!     vec![Parameter::new("id", 1)],
//! )?;
//! assert_eq!(student.name, "Ada");
//! assert_eq!(db.get_int("SELECT count(*) FROM student", ())?, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod decimal;
pub mod driver;
pub mod error;
pub(crate) mod executor;
pub mod helper;
pub mod hooks;
pub mod mapping;
pub mod params;
pub mod prelude;
pub mod results;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{AmbientParameters, CommandOptions, DisposePolicy, HelperOptions};
pub use cursor::RowCursor;
pub use decimal::Decimal;
pub use driver::{Driver, RawCursor};
pub use error::SqlHelperError;
pub use helper::SqlHelper;
pub use hooks::LogHooks;
pub use mapping::{FromRow, FromValue, Record};
pub use params::{Bag, IntoParameters, Parameter, ParameterDirection};
pub use results::{CustomDbRow, ResultSet, TableSet};
pub use translation::{PlaceholderStyle, RewrittenSql};
pub use types::{CommandType, DatabaseType, IsolationLevel, RowValues};
