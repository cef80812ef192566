//! Row-to-value mapping.
//!
//! [`FromRow`] decides how one result row becomes a `T`:
//!
//! - primitives (`i32`, `i64`, `f64`, `bool`, `String`, `NaiveDateTime`,
//!   [`Decimal`], `Vec<u8>`, [`RowValues`] and `Option`s of them) read the first
//!   column;
//! - tuples read the first N columns in order;
//! - `Vec<RowValues>` keeps every column in order;
//! - `HashMap`/`BTreeMap<String, RowValues>` key values by column name;
//! - [`Record`] types get each column assigned to the field with the same name,
//!   ignoring ASCII case.
//!
//! The column-to-field plan is computed once per result, not once per row.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::decimal::Decimal;
use crate::error::SqlHelperError;
use crate::types::{RowValues, TIMESTAMP_FORMAT};

/// Coercion of a single database value into a Rust value.
pub trait FromValue: Sized {
    /// Name used in conversion errors.
    const TARGET: &'static str;

    /// `None` when the value cannot represent `Self`.
    fn from_value(value: &RowValues) -> Option<Self>;
}

/// Construction of a `T` from one result row.
pub trait FromRow: Sized {
    /// Per-result mapping state built from the column names.
    type Plan;

    /// # Errors
    /// Returns `SqlHelperError::RecordMappingFailed` if the columns cannot feed `Self`.
    fn plan(columns: &[String]) -> Result<Self::Plan, SqlHelperError>;

    /// # Errors
    /// Returns `SqlHelperError::RecordMappingFailed` if a value cannot be converted.
    fn from_row(
        plan: &Self::Plan,
        columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError>;
}

/// Flat record populated field by field.
///
/// Implement by hand or with [`record!`](crate::record):
///
/// ```rust
/// use sql_helper::prelude::*;
///
/// sql_helper::record! {
///     #[derive(Debug, Default)]
///     pub struct Student {
///         pub id: i64,
///         pub name: String,
///         pub nickname: Option<String>,
///     }
/// }
///
/// assert_eq!(Student::field_names(), &["id", "name", "nickname"]);
/// ```
pub trait Record: Default {
    fn field_names() -> &'static [&'static str];

    /// Assign `value` to the field called `name` (as listed by `field_names`).
    ///
    /// # Errors
    /// Returns `SqlHelperError::RecordMappingFailed` if the value does not fit the field.
    fn set_field(&mut self, name: &str, value: RowValues) -> Result<(), SqlHelperError>;
}

/// Coerce a value for a record field.
///
/// # Errors
/// Returns `SqlHelperError::RecordMappingFailed` naming `field`.
pub fn coerce_field<T: FromValue>(field: &str, value: &RowValues) -> Result<T, SqlHelperError> {
    T::from_value(value).ok_or_else(|| mapping_error::<T>(field, value))
}

fn mapping_error<T: FromValue>(column: &str, value: &RowValues) -> SqlHelperError {
    SqlHelperError::RecordMappingFailed {
        target: T::TARGET,
        column: column.to_string(),
        value: value.describe(),
    }
}

fn first_column<T: FromValue>(
    columns: &[String],
    values: &[RowValues],
) -> Result<T, SqlHelperError> {
    let column = columns.first().map_or("<none>", String::as_str);
    let value = values.first().unwrap_or(&RowValues::Null);
    T::from_value(value).ok_or_else(|| mapping_error::<T>(column, value))
}

impl<T: Record> FromRow for T {
    /// Field matched by each column, by column index.
    type Plan = Vec<Option<&'static str>>;

    fn plan(columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
        let fields = T::field_names();
        Ok(columns
            .iter()
            .map(|col| fields.iter().copied().find(|f| f.eq_ignore_ascii_case(col)))
            .collect())
    }

    fn from_row(
        plan: &Self::Plan,
        _columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError> {
        let mut record = T::default();
        for (field, value) in plan.iter().zip(values) {
            if let Some(field) = field {
                record.set_field(field, value)?;
            }
        }
        Ok(record)
    }
}

macro_rules! impl_from_row_first_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                type Plan = ();

                fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
                    Ok(())
                }

                fn from_row(
                    _plan: &Self::Plan,
                    columns: &[String],
                    values: Vec<RowValues>,
                ) -> Result<Self, SqlHelperError> {
                    first_column::<$ty>(columns, &values)
                }
            }
        )*
    };
}

impl_from_row_first_column!(i32, i64, f64, bool, String, NaiveDateTime, Decimal, Vec<u8>, RowValues);

impl<T: FromValue> FromRow for Option<T> {
    type Plan = ();

    fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
        Ok(())
    }

    fn from_row(
        _plan: &Self::Plan,
        columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError> {
        first_column::<Option<T>>(columns, &values)
    }
}

macro_rules! impl_from_row_tuple {
    ($(($($name:ident : $idx:tt),+)),+ $(,)?) => {
        $(
            impl<$($name: FromValue),+> FromRow for ($($name,)+) {
                type Plan = ();

                fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
                    Ok(())
                }

                fn from_row(
                    _plan: &Self::Plan,
                    columns: &[String],
                    values: Vec<RowValues>,
                ) -> Result<Self, SqlHelperError> {
                    Ok(($(
                        {
                            let column = columns.get($idx).map_or("<none>", String::as_str);
                            let value = values.get($idx).unwrap_or(&RowValues::Null);
                            $name::from_value(value)
                                .ok_or_else(|| mapping_error::<$name>(column, value))?
                        },
                    )+))
                }
            }
        )+
    };
}

impl_from_row_tuple!((A: 0, B: 1), (A: 0, B: 1, C: 2), (A: 0, B: 1, C: 2, D: 3));

impl FromRow for Vec<RowValues> {
    type Plan = ();

    fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
        Ok(())
    }

    fn from_row(
        _plan: &Self::Plan,
        _columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError> {
        Ok(values)
    }
}

impl FromRow for HashMap<String, RowValues> {
    type Plan = ();

    fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
        Ok(())
    }

    fn from_row(
        _plan: &Self::Plan,
        columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError> {
        let mut map = HashMap::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(values) {
            map.entry(column.clone()).or_insert(value);
        }
        Ok(map)
    }
}

impl FromRow for BTreeMap<String, RowValues> {
    type Plan = ();

    fn plan(_columns: &[String]) -> Result<Self::Plan, SqlHelperError> {
        Ok(())
    }

    fn from_row(
        _plan: &Self::Plan,
        columns: &[String],
        values: Vec<RowValues>,
    ) -> Result<Self, SqlHelperError> {
        let mut map = BTreeMap::new();
        for (column, value) in columns.iter().zip(values) {
            map.entry(column.clone()).or_insert(value);
        }
        Ok(map)
    }
}

impl FromValue for i64 {
    const TARGET: &'static str = "i64";

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Int(i) => Some(*i),
            RowValues::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Some(*f as i64),
            RowValues::Bool(b) => Some(i64::from(*b)),
            RowValues::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .and_then(|f| i64::from_value(&RowValues::Float(f)))
                })
            }
            RowValues::JSON(v) => v.as_i64(),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    const TARGET: &'static str = "i32";

    fn from_value(value: &RowValues) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    const TARGET: &'static str = "f64";

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Int(i) => Some(*i as f64),
            RowValues::Float(f) => Some(*f),
            RowValues::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            RowValues::Text(s) => s.trim().parse().ok(),
            RowValues::JSON(v) => v.as_f64(),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const TARGET: &'static str = "bool";

    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Bool(b) => Some(*b),
            RowValues::Int(i) => Some(*i != 0),
            RowValues::Float(f) => Some(*f != 0.0),
            RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(true),
                "false" | "f" | "0" | "no" => Some(false),
                _ => None,
            },
            RowValues::JSON(v) => v.as_bool(),
            _ => None,
        }
    }
}

impl FromValue for String {
    const TARGET: &'static str = "String";

    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Text(s) => Some(s.clone()),
            RowValues::Int(i) => Some(i.to_string()),
            RowValues::Float(f) => Some(f.to_string()),
            RowValues::Bool(b) => Some(b.to_string()),
            RowValues::Timestamp(dt) => Some(dt.format(TIMESTAMP_FORMAT).to_string()),
            RowValues::JSON(serde_json::Value::String(s)) => Some(s.clone()),
            RowValues::JSON(v) => Some(v.to_string()),
            RowValues::Blob(b) => String::from_utf8(b.clone()).ok(),
            RowValues::Null => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    const TARGET: &'static str = "NaiveDateTime";

    fn from_value(value: &RowValues) -> Option<Self> {
        value.as_timestamp()
    }
}

impl FromValue for Decimal {
    const TARGET: &'static str = "Decimal";

    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Int(i) => Some(Decimal::from(*i)),
            RowValues::Float(f) => Decimal::try_from_f64(*f).ok(),
            RowValues::Text(s) => s.parse().ok(),
            RowValues::JSON(serde_json::Value::Number(n)) => n.to_string().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const TARGET: &'static str = "Vec<u8>";

    fn from_value(value: &RowValues) -> Option<Self> {
        match value {
            RowValues::Blob(b) => Some(b.clone()),
            RowValues::Text(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        }
    }
}

impl FromValue for RowValues {
    const TARGET: &'static str = "RowValues";

    fn from_value(value: &RowValues) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_value(value: &RowValues) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Declare a struct and implement [`Record`] for it.
///
/// The struct must also derive (or implement) `Default`; NULL columns leave the
/// field at its default.
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::mapping::Record for $name {
            fn field_names() -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::RowValues,
            ) -> ::std::result::Result<(), $crate::SqlHelperError> {
                if value.is_null() {
                    return Ok(());
                }
                $(
                    if name == stringify!($field) {
                        self.$field = $crate::mapping::coerce_field::<$ty>(name, &value)?;
                        return Ok(());
                    }
                )*
                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Person {
            id: i64,
            name: String,
            score: Option<f64>,
            born: Option<NaiveDateTime>,
        }
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn record_matches_columns_ignoring_case() {
        let columns = cols(&["ID", "Name", "unused"]);
        let plan = Person::plan(&columns).unwrap();
        let person = Person::from_row(
            &plan,
            &columns,
            vec![
                RowValues::Int(4),
                RowValues::Text("Ada".into()),
                RowValues::Bool(true),
            ],
        )
        .unwrap();
        assert_eq!(
            person,
            Person {
                id: 4,
                name: "Ada".into(),
                score: None,
                born: None,
            }
        );
    }

    #[test]
    fn record_nulls_keep_defaults_and_coerce_text() {
        let columns = cols(&["id", "score", "born"]);
        let plan = Person::plan(&columns).unwrap();
        let person = Person::from_row(
            &plan,
            &columns,
            vec![
                RowValues::Null,
                RowValues::Text("2.5".into()),
                RowValues::Text("1990-01-02 03:04:05".into()),
            ],
        )
        .unwrap();
        assert_eq!(person.id, 0);
        assert_eq!(person.score, Some(2.5));
        assert_eq!(
            person.born,
            NaiveDate::from_ymd_opt(1990, 1, 2).and_then(|d| d.and_hms_opt(3, 4, 5))
        );
    }

    #[test]
    fn record_reports_bad_field() {
        let columns = cols(&["id"]);
        let plan = Person::plan(&columns).unwrap();
        let err = Person::from_row(&plan, &columns, vec![RowValues::Text("x".into())])
            .unwrap_err();
        assert!(matches!(
            err,
            SqlHelperError::RecordMappingFailed { target: "i64", ref column, .. } if column == "id"
        ));
    }

    #[test]
    fn primitives_read_first_column() {
        let columns = cols(&["n", "other"]);
        let values = vec![RowValues::Text("42".into()), RowValues::Null];
        assert_eq!(i32::from_row(&(), &columns, values.clone()).unwrap(), 42);
        assert_eq!(String::from_row(&(), &columns, values).unwrap(), "42");
        assert_eq!(
            Option::<i64>::from_row(&(), &columns, vec![RowValues::Null]).unwrap(),
            None
        );
        assert!(i64::from_row(&(), &columns, vec![RowValues::Null]).is_err());
    }

    #[test]
    fn tuples_arrays_and_maps() {
        let columns = cols(&["a", "b"]);
        let values = vec![RowValues::Int(1), RowValues::Text("x".into())];

        let pair = <(i64, String)>::from_row(&(), &columns, values.clone()).unwrap();
        assert_eq!(pair, (1, "x".to_string()));

        let arr = Vec::<RowValues>::from_row(&(), &columns, values.clone()).unwrap();
        assert_eq!(arr, values);

        let map = HashMap::<String, RowValues>::from_row(&(), &columns, values.clone()).unwrap();
        assert_eq!(map.get("b"), Some(&RowValues::Text("x".into())));

        let ordered = BTreeMap::<String, RowValues>::from_row(&(), &columns, values).unwrap();
        assert_eq!(ordered.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn scalar_coercions() {
        assert_eq!(i64::from_value(&RowValues::Float(3.0)), Some(3));
        assert_eq!(i64::from_value(&RowValues::Float(3.5)), None);
        assert_eq!(i32::from_value(&RowValues::Int(i64::MAX)), None);
        assert_eq!(f64::from_value(&RowValues::Text(" 1.25 ".into())), Some(1.25));
        assert_eq!(bool::from_value(&RowValues::Text("TRUE".into())), Some(true));
        assert_eq!(bool::from_value(&RowValues::Int(0)), Some(false));
        assert_eq!(
            Decimal::from_value(&RowValues::Text("10.50".into())),
            Some(Decimal::new(105, 1))
        );
        assert_eq!(String::from_value(&RowValues::Null), None);
        assert_eq!(
            Option::<String>::from_value(&RowValues::Null),
            Some(None)
        );
    }
}
