use std::error::Error;

use chrono::{TimeZone, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes::BytesMut;

use super::numeric;
use crate::decimal::Decimal;
use crate::types::RowValues;

/// Borrowed parameter list in binding order.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

fn narrowing_error(value: i64, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("{value} does not fit in {ty}").into()
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (RowValues::Null, _) => Ok(IsNull::Yes),
            (RowValues::Int(i), &Type::INT2) => i16::try_from(*i)
                .map_err(|_| narrowing_error(*i, ty))?
                .to_sql(ty, out),
            (RowValues::Int(i), &Type::INT4) => i32::try_from(*i)
                .map_err(|_| narrowing_error(*i, ty))?
                .to_sql(ty, out),
            #[allow(clippy::cast_precision_loss)]
            (RowValues::Int(i), &Type::FLOAT4 | &Type::FLOAT8) => (*i as f64).to_sql(ty, out),
            (RowValues::Int(i), &Type::NUMERIC) => {
                numeric::encode(Decimal::from(*i), out)?;
                Ok(IsNull::No)
            }
            (RowValues::Int(i), _) => (*i).to_sql(ty, out),
            #[allow(clippy::cast_possible_truncation)]
            (RowValues::Float(f), &Type::FLOAT4) => (*f as f32).to_sql(ty, out),
            (RowValues::Float(f), &Type::NUMERIC) => {
                numeric::encode(Decimal::try_from_f64(*f)?, out)?;
                Ok(IsNull::No)
            }
            (RowValues::Float(f), _) => (*f).to_sql(ty, out),
            (RowValues::Text(s), &Type::NUMERIC) => {
                numeric::encode(s.parse::<Decimal>()?, out)?;
                Ok(IsNull::No)
            }
            (RowValues::Text(s), _) => s.to_sql(ty, out),
            (RowValues::Bool(b), _) => (*b).to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMPTZ) => {
                Utc.from_utc_datetime(dt).to_sql(ty, out)
            }
            (RowValues::Timestamp(dt), &Type::DATE) => dt.date().to_sql(ty, out),
            (RowValues::Timestamp(dt), _) => dt.to_sql(ty, out),
            (RowValues::JSON(jsval), _) => jsval.to_sql(ty, out),
            (RowValues::Blob(bytes), _) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}
