//! TableService against a live PostgreSQL. Skipped unless `DATABASE_URL` is set.
//!
//! Each test creates its own schema so tests can run concurrently and leave nothing behind.

use dyndb_sdk::{AccessError, ColumnMap, ErrorKind, TableService};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

struct Fixture {
    pool: PgPool,
    schema: String,
}

impl Fixture {
    async fn drop_schema(self) {
        let _ = sqlx::query(&format!("DROP SCHEMA \"{}\" CASCADE", self.schema))
            .execute(&self.pool)
            .await;
    }
}

/// Connects and creates `widgets` in a fresh schema, or returns None without a database.
async fn fixture() -> Option<Fixture> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("Skipping test - DATABASE_URL not set");
        return None;
    };
    let pool = PgPoolOptions::new().max_connections(8).connect(&url).await.ok()?;
    let schema = format!("t_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema)).execute(&pool).await.ok()?;
    sqlx::query(&format!(
        r#"CREATE TABLE "{}".widgets (
            id SERIAL PRIMARY KEY,
            sku TEXT UNIQUE NOT NULL,
            category TEXT,
            price NUMERIC(10, 2),
            in_stock BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"#,
        schema
    ))
    .execute(&pool)
    .await
    .ok()?;
    Some(Fixture { pool, schema })
}

/// Adds `counters`, a table whose columns all decode natively so reads use `SELECT *`.
async fn add_counters(fx: &Fixture) {
    sqlx::query(&format!(
        "CREATE TABLE \"{}\".counters (id SERIAL PRIMARY KEY, qty INT4 NOT NULL)",
        fx.schema
    ))
    .execute(&fx.pool)
    .await
    .unwrap();
}

fn record(v: serde_json::Value) -> ColumnMap {
    serde_json::from_value(v).unwrap()
}

#[tokio::test]
async fn test_catalog_listing() {
    let Some(fx) = fixture().await else { return };

    let schemas = TableService::list_schemas(&fx.pool).await.unwrap();
    assert!(schemas.contains(&fx.schema));
    assert!(!schemas.iter().any(|s| s == "information_schema" || s.starts_with("pg_")));

    let tables = TableService::list_tables(&fx.pool, &fx.schema).await.unwrap();
    assert_eq!(tables, vec!["widgets"]);

    let cols = TableService::describe_columns(&fx.pool, &fx.schema, "widgets").await.unwrap();
    let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "sku", "category", "price", "in_stock", "created_at"]);
    assert!(!cols[1].nullable);
    assert!(cols[0].column_default.as_deref().unwrap_or("").starts_with("nextval"));

    assert!(TableService::table_exists(&fx.pool, &fx.schema, "widgets").await.unwrap());
    assert!(!TableService::table_exists(&fx.pool, &fx.schema, "gadgets").await.unwrap());
    assert!(!TableService::table_exists(&fx.pool, "no_such_schema", "widgets").await.unwrap());
    assert!(!TableService::table_exists(&fx.pool, &fx.schema, "bad\nname").await.unwrap());
    assert!(!TableService::table_exists(&fx.pool, "", "widgets").await.unwrap());

    let err = TableService::list_tables(&fx.pool, "no_such_schema").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_insert_then_select_round_trip() {
    let Some(fx) = fixture().await else { return };

    let inserted = TableService::insert_row(
        &fx.pool,
        &fx.schema,
        "widgets",
        &record(json!({"sku": "HAM-1", "category": "tools", "price": "12.50"})),
    )
    .await
    .unwrap();
    assert_eq!(inserted.row_count, 1);
    let row = &inserted.rows[0];
    for col in ["id", "sku", "category", "price", "in_stock", "created_at"] {
        assert!(row.contains_key(col), "missing {}", col);
    }
    assert_eq!(row["price"], json!("12.50"));
    assert_eq!(row["in_stock"], json!(true));
    assert!(row["created_at"].as_str().unwrap().contains('T'));

    let mut by_sku = ColumnMap::new();
    by_sku.insert("sku", "HAM-1");
    let selected = TableService::select_rows(&fx.pool, &fx.schema, "widgets", &by_sku, 10, 0)
        .await
        .unwrap();
    assert_eq!(selected.rows, inserted.rows);
    assert_eq!(selected.columns, inserted.columns);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_text_filters_bind_into_typed_columns() {
    let Some(fx) = fixture().await else { return };

    let inserted = TableService::insert_row(&fx.pool, &fx.schema, "widgets", &record(json!({"sku": "A"})))
        .await
        .unwrap();
    let id = inserted.rows[0]["id"].as_i64().unwrap();

    let mut filters = ColumnMap::new();
    filters.insert("id", id.to_string());
    filters.insert("in_stock", "true");
    let rs = TableService::select_rows(&fx.pool, &fx.schema, "widgets", &filters, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.row_count, 1);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_absent_table_is_not_found() {
    let Some(fx) = fixture().await else { return };

    let err = TableService::select_rows(&fx.pool, &fx.schema, "gadgets", &ColumnMap::new(), 10, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));

    let err = TableService::insert_row(&fx.pool, &fx.schema, "gadgets", &record(json!({"a": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));

    let mut f = ColumnMap::new();
    f.insert("id", 1i64);
    let err = TableService::delete_rows(&fx.pool, &fx.schema, "gadgets", &f).await.unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));

    let err = TableService::update_rows(&fx.pool, &fx.schema, "gadgets", &record(json!({"a": 1})), &f)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));

    let err = TableService::describe_columns(&fx.pool, &fx.schema, "gadgets").await.unwrap_err();
    assert!(matches!(err, AccessError::NotFound(_)));

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_update_and_delete() {
    let Some(fx) = fixture().await else { return };

    for sku in ["A", "B", "C"] {
        TableService::insert_row(
            &fx.pool,
            &fx.schema,
            "widgets",
            &record(json!({"sku": sku, "category": "tools"})),
        )
        .await
        .unwrap();
    }

    let mut filters = ColumnMap::new();
    filters.insert("category", "tools");
    let mut set = ColumnMap::new();
    set.insert("category", "hardware");
    let updated = TableService::update_rows(&fx.pool, &fx.schema, "widgets", &set, &filters)
        .await
        .unwrap();
    assert_eq!(updated.row_count, 3);
    assert!(updated.rows.iter().all(|r| r["category"] == "hardware"));

    let err = TableService::delete_rows(&fx.pool, &fx.schema, "widgets", &ColumnMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let mut one = ColumnMap::new();
    one.insert("sku", "B");
    let deleted = TableService::delete_rows(&fx.pool, &fx.schema, "widgets", &one).await.unwrap();
    assert_eq!(deleted, 1);

    let rest = TableService::select_rows(&fx.pool, &fx.schema, "widgets", &ColumnMap::new(), 5000, -1)
        .await
        .unwrap();
    assert_eq!(rest.row_count, 2);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let Some(fx) = fixture().await else { return };

    TableService::insert_row(&fx.pool, &fx.schema, "widgets", &record(json!({"sku": "A"})))
        .await
        .unwrap();
    TableService::insert_row(&fx.pool, &fx.schema, "widgets", &record(json!({"sku": "B"})))
        .await
        .unwrap();

    // Setting every sku to the same value violates the unique constraint after the first row.
    let mut set = ColumnMap::new();
    set.insert("sku", "DUP");
    let mut filters = ColumnMap::new();
    filters.insert("in_stock", true);
    let err = TableService::update_rows(&fx.pool, &fx.schema, "widgets", &set, &filters)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionError);

    let mut dup = ColumnMap::new();
    dup.insert("sku", "DUP");
    let rs = TableService::select_rows(&fx.pool, &fx.schema, "widgets", &dup, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.row_count, 0);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_unknown_column_is_validation_error() {
    let Some(fx) = fixture().await else { return };

    let mut f = ColumnMap::new();
    f.insert("colour", "red");
    let err = TableService::select_rows(&fx.pool, &fx.schema, "widgets", &f, 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_concurrent_inserts_see_own_rows() {
    let Some(fx) = fixture().await else { return };

    let mut handles = Vec::new();
    for i in 0..16 {
        let pool = fx.pool.clone();
        let schema = fx.schema.clone();
        handles.push(tokio::spawn(async move {
            let mut r = ColumnMap::new();
            r.insert("sku", format!("SKU-{}", i));
            r.insert("category", i.to_string());
            let rs = TableService::insert_row(&pool, &schema, "widgets", &r).await.unwrap();
            (i, rs)
        }));
    }
    for h in handles {
        let (i, rs) = h.await.unwrap();
        assert_eq!(rs.row_count, 1);
        assert_eq!(rs.rows[0]["sku"], json!(format!("SKU-{}", i)));
        assert_eq!(rs.rows[0]["category"], json!(i.to_string()));
    }

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_driver_errors_map_by_sqlstate() {
    let Some(fx) = fixture().await else { return };

    sqlx::query(&format!("CREATE TABLE \"{}\".gone (id INT4)", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap();
    sqlx::query(&format!("DROP TABLE \"{}\".gone", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap();

    // 42P01 undefined_table
    let err: AccessError = sqlx::query(&format!("SELECT * FROM \"{}\".gone", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // 42703 undefined_column
    let err: AccessError = sqlx::query(&format!("SELECT colour FROM \"{}\".widgets", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    // 23505 unique_violation stays an execution error
    sqlx::query(&format!("INSERT INTO \"{}\".widgets (sku) VALUES ('X')", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap();
    let err: AccessError = sqlx::query(&format!("INSERT INTO \"{}\".widgets (sku) VALUES ('X')", fx.schema))
        .execute(&fx.pool)
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.kind(), ErrorKind::ExecutionError);

    let err = TableService::select_rows(&fx.pool, &fx.schema, "gone", &ColumnMap::new(), 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    fx.drop_schema().await;
}

#[tokio::test]
async fn test_reads_follow_table_changes_on_same_connection() {
    let Some(fx) = fixture().await else { return };
    add_counters(&fx).await;

    let url = std::env::var("DATABASE_URL").unwrap();
    let single = PgPoolOptions::new().max_connections(1).connect(&url).await.unwrap();
    let all = ColumnMap::new();

    TableService::insert_row(&single, &fx.schema, "counters", &record(json!({"qty": 1})))
        .await
        .unwrap();
    let before = TableService::select_rows(&single, &fx.schema, "counters", &all, 10, 0)
        .await
        .unwrap();
    assert_eq!(before.columns, vec!["id", "qty"]);

    sqlx::query(&format!("ALTER TABLE \"{}\".counters ADD COLUMN extra INT4", fx.schema))
        .execute(&single)
        .await
        .unwrap();
    let after = TableService::select_rows(&single, &fx.schema, "counters", &all, 10, 0)
        .await
        .unwrap();
    assert_eq!(after.columns, vec!["id", "qty", "extra"]);
    assert_eq!(after.rows[0]["extra"], json!(null));

    sqlx::query(&format!("ALTER TABLE \"{}\".counters ALTER COLUMN qty TYPE INT8", fx.schema))
        .execute(&single)
        .await
        .unwrap();
    let retyped = TableService::insert_row(&single, &fx.schema, "counters", &record(json!({"qty": 2})))
        .await
        .unwrap();
    assert_eq!(retyped.rows[0]["qty"], json!(2));
    let rs = TableService::select_rows(&single, &fx.schema, "counters", &all, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.row_count, 2);

    single.close().await;
    fx.drop_schema().await;
}

#[tokio::test]
async fn test_typed_filters_compare_natively() {
    let Some(fx) = fixture().await else { return };
    add_counters(&fx).await;

    for qty in [3, 1] {
        TableService::insert_row(&fx.pool, &fx.schema, "counters", &record(json!({"qty": qty})))
            .await
            .unwrap();
    }

    let mut f = ColumnMap::new();
    f.insert("qty", 2.6f64);
    let rs = TableService::select_rows(&fx.pool, &fx.schema, "counters", &f, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.row_count, 0);

    f.insert("qty", 3i64);
    let rs = TableService::select_rows(&fx.pool, &fx.schema, "counters", &f, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.row_count, 1);

    f.insert("qty", "1");
    let rs = TableService::select_rows(&fx.pool, &fx.schema, "counters", &f, 10, 0)
        .await
        .unwrap();
    assert_eq!(rs.rows[0]["qty"], json!(1));

    // integer = boolean has no operator
    f.insert("qty", true);
    let err = TableService::select_rows(&fx.pool, &fx.schema, "counters", &f, 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionError);

    fx.drop_schema().await;
}
