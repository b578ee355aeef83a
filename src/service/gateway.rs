//! Execution gateway: catalog guard, statement build, execute, commit or roll back.
//!
//! Every call checks out one connection and runs the existence check, the column lookup
//! and the statement inside a single transaction.

use crate::catalog::{self, ColumnDescriptor};
use crate::error::AccessError;
use crate::service::normalize::ResultSet;
use crate::sql::{
    build_delete, build_insert, build_select, build_update, CompiledStatement, FilterMap, Ident,
    ProjectedColumn, Projection, RecordMap, Statement,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;

/// Columns of a table confirmed present in the catalog within the current transaction.
struct TableShape {
    schema: Ident,
    table: Ident,
    columns: Vec<ColumnDescriptor>,
}

impl TableShape {
    async fn load(conn: &mut PgConnection, schema: Ident, table: Ident) -> Result<Self, AccessError> {
        if !catalog::table_exists(&mut *conn, &schema, &table).await? {
            return Err(AccessError::table_not_found(schema.as_str(), table.as_str()));
        }
        let columns = catalog::describe_columns(conn, &schema, &table).await?;
        Ok(TableShape { schema, table, columns })
    }

    fn check_columns<'a>(&self, names: impl Iterator<Item = &'a str>) -> Result<(), AccessError> {
        for name in names {
            if !self.columns.iter().any(|c| c.name == name) {
                return Err(AccessError::Validation(format!(
                    "unknown column {} in {}.{}",
                    name, self.schema, self.table
                )));
            }
        }
        Ok(())
    }

    fn casts(&self) -> HashMap<String, String> {
        self.columns.iter().map(|c| (c.name.clone(), c.cast_type())).collect()
    }

    /// Explicit column list when some column needs a text cast; `*` otherwise.
    fn projection(&self) -> Result<Projection, AccessError> {
        if !self.columns.iter().any(ColumnDescriptor::needs_text_projection) {
            return Ok(Projection::All);
        }
        let cols = self
            .columns
            .iter()
            .map(|c| {
                Ok(ProjectedColumn {
                    name: Ident::parse(&c.name)?,
                    as_text: c.needs_text_projection(),
                })
            })
            .collect::<Result<Vec<_>, AccessError>>()?;
        Ok(Projection::Columns(cols))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Generic table access. The pool is passed in by the caller on every call.
pub struct TableService;

impl TableService {
    /// Schemas other than `information_schema` and `pg_*`, sorted.
    pub async fn list_schemas(pool: &PgPool) -> Result<Vec<String>, AccessError> {
        let mut conn = pool.acquire().await?;
        catalog::list_schemas(&mut conn).await
    }

    /// Base tables in `schema`, sorted. NotFound when the schema is absent.
    pub async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<String>, AccessError> {
        let schema = Ident::parse(schema)?;
        let mut tx = begin_read_only(pool).await?;
        let result = async {
            if !catalog::schema_exists(&mut tx, &schema).await? {
                return Err(AccessError::NotFound(format!("schema {}", schema)));
            }
            catalog::list_tables(&mut tx, &schema).await
        }
        .await;
        finish(tx, result).await
    }

    /// Columns in ordinal order. NotFound when the table is absent.
    pub async fn describe_columns(
        pool: &PgPool,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, AccessError> {
        let (schema, table) = (Ident::parse(schema)?, Ident::parse(table)?);
        let mut tx = begin_read_only(pool).await?;
        let result = TableShape::load(&mut tx, schema, table).await.map(|s| s.columns);
        finish(tx, result).await
    }

    /// False for any pair not present, including names that are not valid identifiers.
    pub async fn table_exists(pool: &PgPool, schema: &str, table: &str) -> Result<bool, AccessError> {
        let (Ok(schema), Ok(table)) = (Ident::parse(schema), Ident::parse(table)) else {
            return Ok(false);
        };
        let mut conn = pool.acquire().await?;
        catalog::table_exists(&mut conn, &schema, &table).await
    }

    /// One page of rows matching all `filters`. `limit` is clamped to [0, 1000] and
    /// `offset` to [0, inf).
    pub async fn select_rows(
        pool: &PgPool,
        schema: &str,
        table: &str,
        filters: &FilterMap,
        limit: i64,
        offset: i64,
    ) -> Result<ResultSet, AccessError> {
        let (schema, table) = (Ident::parse(schema)?, Ident::parse(table)?);
        let mut tx = begin_read_only(pool).await?;
        let result = async {
            let shape = TableShape::load(&mut tx, schema, table).await?;
            shape.check_columns(filters.columns())?;
            let stmt = build_select(&shape.schema, &shape.table, filters, limit, offset, &shape.projection()?)?;
            let rows = fetch_all(&mut tx, &stmt, &shape.casts()).await?;
            ResultSet::from_rows(&rows, shape.column_names())
        }
        .await;
        finish(tx, result).await
    }

    /// Insert one row; returns it as stored, defaults included.
    pub async fn insert_row(
        pool: &PgPool,
        schema: &str,
        table: &str,
        record: &RecordMap,
    ) -> Result<ResultSet, AccessError> {
        let (schema, table) = (Ident::parse(schema)?, Ident::parse(table)?);
        if record.is_empty() {
            return Err(AccessError::Validation("insert requires at least one column".into()));
        }
        let mut tx = pool.begin().await?;
        let result = async {
            let shape = TableShape::load(&mut tx, schema, table).await?;
            shape.check_columns(record.columns())?;
            let stmt = build_insert(&shape.schema, &shape.table, record, &shape.projection()?)?;
            let rows = fetch_all(&mut tx, &stmt, &shape.casts()).await?;
            let rs = ResultSet::from_rows(&rows, shape.column_names())?;
            tracing::info!(schema = %shape.schema, table = %shape.table, "row inserted");
            Ok::<_, AccessError>(rs)
        }
        .await;
        finish(tx, result).await
    }

    /// Update every row matching `filters`; returns the updated rows. Empty `record` or
    /// `filters` is rejected before any connection is taken.
    pub async fn update_rows(
        pool: &PgPool,
        schema: &str,
        table: &str,
        record: &RecordMap,
        filters: &FilterMap,
    ) -> Result<ResultSet, AccessError> {
        let (schema, table) = (Ident::parse(schema)?, Ident::parse(table)?);
        if record.is_empty() {
            return Err(AccessError::Validation("update requires at least one column to set".into()));
        }
        if filters.is_empty() {
            return Err(AccessError::Validation("update requires at least one filter".into()));
        }
        let mut tx = pool.begin().await?;
        let result = async {
            let shape = TableShape::load(&mut tx, schema, table).await?;
            shape.check_columns(record.columns().chain(filters.columns()))?;
            let stmt = build_update(&shape.schema, &shape.table, record, filters, &shape.projection()?)?;
            let rows = fetch_all(&mut tx, &stmt, &shape.casts()).await?;
            let rs = ResultSet::from_rows(&rows, shape.column_names())?;
            tracing::info!(schema = %shape.schema, table = %shape.table, rows = rs.row_count, "rows updated");
            Ok::<_, AccessError>(rs)
        }
        .await;
        finish(tx, result).await
    }

    /// Delete every row matching `filters`; returns the affected-row count.
    pub async fn delete_rows(
        pool: &PgPool,
        schema: &str,
        table: &str,
        filters: &FilterMap,
    ) -> Result<u64, AccessError> {
        let (schema, table) = (Ident::parse(schema)?, Ident::parse(table)?);
        if filters.is_empty() {
            return Err(AccessError::Validation("delete requires at least one filter".into()));
        }
        let mut tx = pool.begin().await?;
        let result = async {
            let shape = TableShape::load(&mut tx, schema, table).await?;
            shape.check_columns(filters.columns())?;
            let stmt = build_delete(&shape.schema, &shape.table, filters)?;
            let affected = execute(&mut tx, &stmt, &shape.casts()).await?;
            tracing::info!(schema = %shape.schema, table = %shape.table, rows = affected, "rows deleted");
            Ok::<_, AccessError>(affected)
        }
        .await;
        finish(tx, result).await
    }
}

async fn begin_read_only(pool: &PgPool) -> Result<Transaction<'static, Postgres>, AccessError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
    Ok(tx)
}

/// Commit on success. On failure roll back before handing the error back, so the
/// connection returns to the pool clean.
async fn finish<T>(tx: Transaction<'static, Postgres>, result: Result<T, AccessError>) -> Result<T, AccessError> {
    match result {
        Ok(v) => {
            tx.commit().await?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Compile and bind `stmt` as an unnamed statement. Table shape can change between
/// calls, so no prepared statement outlives the call on the pooled connection.
fn prepare<'a>(
    compiled: &'a CompiledStatement<'_>,
) -> sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&compiled.sql).persistent(false);
    for v in &compiled.values {
        query = query.bind((*v).clone());
    }
    query
}

async fn fetch_all(
    conn: &mut PgConnection,
    stmt: &Statement,
    casts: &HashMap<String, String>,
) -> Result<Vec<PgRow>, AccessError> {
    let compiled = stmt.compile(casts);
    tracing::debug!(sql = %compiled.sql, params = %stmt.params_json(), "query");
    Ok(prepare(&compiled).fetch_all(conn).await?)
}

/// Run a statement without a result set; returns the affected-row count.
async fn execute(
    conn: &mut PgConnection,
    stmt: &Statement,
    casts: &HashMap<String, String>,
) -> Result<u64, AccessError> {
    let compiled = stmt.compile(casts);
    tracing::debug!(sql = %compiled.sql, params = %stmt.params_json(), "execute");
    Ok(prepare(&compiled).execute(conn).await?.rows_affected())
}
