//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{
    AmbientParameters, CommandOptions, DisposePolicy, HelperOptions, HelperOptionsBuilder,
};
pub use crate::cursor::RowCursor;
pub use crate::decimal::Decimal;
pub use crate::error::SqlHelperError;
pub use crate::helper::SqlHelper;
pub use crate::hooks::LogHooks;
pub use crate::mapping::{FromRow, FromValue, Record};
pub use crate::params::{Bag, IntoParameters, Parameter, ParameterDirection};
pub use crate::results::{CustomDbRow, ResultSet, TableSet};
pub use crate::translation::{PlaceholderStyle, RewrittenSql, rewrite, translate_placeholders};
pub use crate::types::{CommandType, DatabaseType, IsolationLevel, RowValues};
