//! Catalog reads over `information_schema`: schemas, base tables, columns.
//!
//! The views expose domain types (`sql_identifier`, `character_data`, ...) that sqlx will
//! not decode as `String`, so every selected column is cast to text.

use crate::error::AccessError;
use crate::sql::ident::{quote, Ident};
use serde::Serialize;
use sqlx::PgConnection;

/// Built-in types the result normalizer decodes natively. Anything else is projected as text.
const NATIVE_TYPES: &[&str] = &[
    "int2", "int4", "int8", "float4", "float8", "bool", "text", "varchar", "bpchar", "name", "uuid",
    "timestamptz", "timestamp", "date", "time", "json", "jsonb",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type as reported by `information_schema.columns.data_type`.
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(rename = "default")]
    pub column_default: Option<String>,
    #[serde(skip)]
    pub udt_schema: String,
    pub udt_name: String,
    pub ordinal_position: i32,
}

impl ColumnDescriptor {
    /// Type expression for casting a bound parameter into this column.
    pub fn cast_type(&self) -> String {
        format!("{}.{}", quote(&self.udt_schema), quote(&self.udt_name))
    }

    /// Whether values of this column must be selected as `::text`.
    pub fn needs_text_projection(&self) -> bool {
        self.udt_schema != "pg_catalog" || !NATIVE_TYPES.contains(&self.udt_name.as_str())
    }
}

/// User schemas, sorted. Excludes `information_schema` and `pg_*` (catalog, toast, temp).
pub async fn list_schemas(conn: &mut PgConnection) -> Result<Vec<String>, AccessError> {
    let rows = sqlx::query_scalar::<_, String>(
        r#"
        SELECT schema_name::text
        FROM information_schema.schemata
        WHERE schema_name::text <> 'information_schema'
          AND schema_name::text NOT LIKE 'pg\_%'
        ORDER BY schema_name::text
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn schema_exists(conn: &mut PgConnection, schema: &Ident) -> Result<bool, AccessError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name::text = $1)",
    )
    .bind(schema.as_str())
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Base tables in `schema`, sorted. Views and foreign tables are not listed.
pub async fn list_tables(conn: &mut PgConnection, schema: &Ident) -> Result<Vec<String>, AccessError> {
    let rows = sqlx::query_scalar::<_, String>(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema::text = $1 AND table_type::text = 'BASE TABLE'
        ORDER BY table_name::text
        "#,
    )
    .bind(schema.as_str())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn table_exists(conn: &mut PgConnection, schema: &Ident, table: &Ident) -> Result<bool, AccessError> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema::text = $1 AND table_name::text = $2 AND table_type::text = 'BASE TABLE'
        )
        "#,
    )
    .bind(schema.as_str())
    .bind(table.as_str())
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Columns in ordinal order. Empty when the table does not exist; callers check
/// [`table_exists`] first.
pub async fn describe_columns(
    conn: &mut PgConnection,
    schema: &Ident,
    table: &Ident,
) -> Result<Vec<ColumnDescriptor>, AccessError> {
    let rows = sqlx::query_as::<_, ColumnDescriptor>(
        r#"
        SELECT column_name::text AS name,
               data_type::text AS data_type,
               (is_nullable::text = 'YES') AS nullable,
               column_default::text AS column_default,
               udt_schema::text AS udt_schema,
               udt_name::text AS udt_name,
               ordinal_position::int4 AS ordinal_position
        FROM information_schema.columns
        WHERE table_schema::text = $1 AND table_name::text = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(schema.as_str())
    .bind(table.as_str())
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
