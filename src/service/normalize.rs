//! Row normalization: PgRow -> ordered JSON record, temporal values as ISO-8601 text.

use crate::error::AccessError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// One normalized row keyed by column name, in column order.
pub type Record = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub row_count: u64,
}

impl ResultSet {
    /// Build from driver rows. Column order comes from the first row; `fallback_columns`
    /// is used when there are no rows to read it from.
    pub fn from_rows(rows: &[PgRow], fallback_columns: Vec<String>) -> Result<Self, AccessError> {
        let columns = match rows.first() {
            Some(r) => r.columns().iter().map(|c| c.name().to_string()).collect(),
            None => fallback_columns,
        };
        let rows = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet {
            columns,
            row_count: rows.len() as u64,
            rows,
        })
    }
}

pub fn row_to_record(row: &PgRow) -> Result<Record, AccessError> {
    let mut map = Map::with_capacity(row.columns().len());
    for col in row.columns() {
        let v = cell_to_value(row, col.ordinal(), col.type_info().name())?;
        map.insert(col.name().to_string(), v);
    }
    Ok(map)
}

fn cell_to_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, AccessError> {
    let v = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|n| float_value(n.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(float_value),
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|u| Value::String(u.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|d| Value::String(timestamptz_iso(&d))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|d| Value::String(timestamp_iso(&d))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|d| Value::String(date_iso(&d))),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(idx)?
            .map(|t| Value::String(time_iso(&t))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
        _ => row.try_get::<Option<String>, _>(idx)?.map(Value::String),
    };
    Ok(v.unwrap_or(Value::Null))
}

/// NaN and infinities have no JSON number form; they are rendered as text.
fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(n.to_string()))
}

pub(crate) fn timestamptz_iso(d: &DateTime<Utc>) -> String {
    d.to_rfc3339()
}

pub(crate) fn timestamp_iso(d: &NaiveDateTime) -> String {
    d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub(crate) fn date_iso(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn time_iso(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}
