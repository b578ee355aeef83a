//! Tagged scalar values for filters and records, and the ordered column maps that carry them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query with its native type.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Arrays and objects, written to json/jsonb columns.
    Json(Value),
}

impl ScalarValue {
    /// JSON numbers become Integer when they fit in i64, otherwise Float. Strings stay Text;
    /// the gateway casts them to the target column's type at bind time.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => ScalarValue::Null,
            Value::Bool(b) => ScalarValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ScalarValue::Integer(i),
                None => n.as_f64().map(ScalarValue::Float).unwrap_or(ScalarValue::Null),
            },
            Value::String(s) => ScalarValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => ScalarValue::Json(v.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ScalarValue::Null => Value::Null,
            ScalarValue::Bool(b) => Value::Bool(*b),
            ScalarValue::Integer(i) => Value::Number((*i).into()),
            ScalarValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ScalarValue::Text(s) => Value::String(s.clone()),
            ScalarValue::Timestamp(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            ScalarValue::Json(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Text and null carry no type of their own and take the target column's type.
    /// Every other variant binds natively so PostgreSQL's comparison rules apply.
    pub fn takes_column_type(&self) -> bool {
        matches!(self, ScalarValue::Null | ScalarValue::Text(_))
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Integer(n)
    }
}

impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self {
        ScalarValue::Integer(n.into())
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Float(n)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for ScalarValue {
    fn from(t: DateTime<Utc>) -> Self {
        ScalarValue::Timestamp(t)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ScalarValue::Null)
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScalarValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| ScalarValue::from_json(&v))
    }
}

impl<'q> Encode<'q, Postgres> for ScalarValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            ScalarValue::Null => <Option<&str> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            ScalarValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            ScalarValue::Integer(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            ScalarValue::Float(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            ScalarValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            ScalarValue::Timestamp(t) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(t, buf)?,
            ScalarValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            ScalarValue::Null | ScalarValue::Text(_) => <&str as Type<Postgres>>::type_info(),
            ScalarValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            ScalarValue::Integer(_) => <i64 as Type<Postgres>>::type_info(),
            ScalarValue::Float(_) => <f64 as Type<Postgres>>::type_info(),
            ScalarValue::Timestamp(_) => <DateTime<Utc> as Type<Postgres>>::type_info(),
            ScalarValue::Json(_) => <Value as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for ScalarValue {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }
}

/// Insertion-ordered column name to value mapping. Inserting an existing column replaces
/// its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnMap {
    entries: Vec<(String, ScalarValue)>,
}

/// Equality filters; every entry becomes one conjoined predicate.
pub type FilterMap = ColumnMap;
/// Column values to write.
pub type RecordMap = ColumnMap;

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<ScalarValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.entries.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn from_json_object(obj: &Map<String, Value>) -> Self {
        obj.iter().map(|(k, v)| (k.clone(), ScalarValue::from_json(v))).collect()
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for ColumnMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut m = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            m.serialize_entry(k, v)?;
        }
        m.end()
    }
}

impl<'de> Deserialize<'de> for ColumnMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(|m| ColumnMap::from_json_object(&m))
    }
}
