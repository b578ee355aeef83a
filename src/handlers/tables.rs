//! Table API handlers: catalog listing, row CRUD, search.

use crate::error::AppError;
use crate::response::{
    ColumnList, DataPage, Deleted, Inserted, SchemaList, SearchParams, SearchResult, TableList, Updated,
};
use crate::service::TableService;
use crate::sql::{clamp_limit, clamp_offset, ColumnMap, DEFAULT_LIMIT};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct InsertBody {
    data: ColumnMap,
}

#[derive(Deserialize)]
struct UpdateBody {
    data: ColumnMap,
    filters: ColumnMap,
}

#[derive(Deserialize)]
struct DeleteBody {
    filters: ColumnMap,
}

#[derive(Deserialize)]
struct FiltersBody {
    #[serde(default)]
    filters: ColumnMap,
}

#[derive(Deserialize)]
struct SearchBody {
    schema: String,
    table: String,
    #[serde(default)]
    filters: ColumnMap,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    if !body.is_object() {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    }
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_int(key: &str, raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be an integer", key)))
}

/// Split query pairs into `limit`/`offset` and text equality filters.
fn split_query(params: Vec<(String, String)>) -> Result<(Option<i64>, Option<i64>, ColumnMap), AppError> {
    let mut limit = None;
    let mut offset = None;
    let mut filters = ColumnMap::new();
    for (k, v) in params {
        match k.as_str() {
            "limit" => limit = Some(parse_int(&k, &v)?),
            "offset" => offset = Some(parse_int(&k, &v)?),
            _ => filters.insert(k, v),
        }
    }
    Ok((limit, offset, filters))
}

fn log_failure<T>(what: &str, schema: &str, table: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(e) = &result {
        tracing::error!(schema, table, error = %e, "{} failed", what);
    }
    result
}

pub async fn list_schemas(State(state): State<AppState>) -> Result<Json<SchemaList>, AppError> {
    let schemas = TableService::list_schemas(&state.pool).await.map_err(|e| {
        tracing::error!(error = %e, "list schemas failed");
        AppError::from(e)
    })?;
    let count = schemas.len();
    Ok(Json(SchemaList { schemas, count }))
}

pub async fn list_tables(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<Json<TableList>, AppError> {
    let tables = log_failure(
        "list tables",
        &schema,
        "",
        TableService::list_tables(&state.pool, &schema).await.map_err(AppError::from),
    )?;
    let count = tables.len();
    Ok(Json(TableList { schema, tables, count }))
}

pub async fn list_columns(
    State(state): State<AppState>,
    Path((schema, table)): Path<(String, String)>,
) -> Result<Json<ColumnList>, AppError> {
    let columns = log_failure(
        "describe columns",
        &schema,
        &table,
        TableService::describe_columns(&state.pool, &schema, &table).await.map_err(AppError::from),
    )?;
    let count = columns.len();
    Ok(Json(ColumnList { schema, table, columns, count }))
}

/// GET data: query keys other than `limit`/`offset` are equality filters. When the query
/// carries no filters, a JSON body `{"filters": {...}}` is accepted instead.
pub async fn select_rows(
    State(state): State<AppState>,
    Path((schema, table)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    body: Option<Json<Value>>,
) -> Result<Json<DataPage>, AppError> {
    let (limit, offset, mut filters) = split_query(params)?;
    if filters.is_empty() {
        if let Some(Json(body)) = body {
            filters = parse_body::<FiltersBody>(body)?.filters;
        }
    }
    let limit = clamp_limit(limit.unwrap_or(DEFAULT_LIMIT));
    let offset = clamp_offset(offset.unwrap_or(0));
    let data = log_failure(
        "select",
        &schema,
        &table,
        TableService::select_rows(&state.pool, &schema, &table, &filters, limit, offset)
            .await
            .map_err(AppError::from),
    )?;
    Ok(Json(DataPage { schema, table, filters, limit, offset, data }))
}

pub async fn insert_row(
    State(state): State<AppState>,
    Path((schema, table)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Inserted>), AppError> {
    let InsertBody { data } = parse_body(body)?;
    let inserted_data = log_failure(
        "insert",
        &schema,
        &table,
        TableService::insert_row(&state.pool, &schema, &table, &data)
            .await
            .map_err(AppError::from),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(Inserted {
            message: "Data inserted successfully",
            schema,
            table,
            inserted_data,
        }),
    ))
}

pub async fn update_rows(
    State(state): State<AppState>,
    Path((schema, table)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Updated>, AppError> {
    let UpdateBody { data, filters } = parse_body(body)?;
    let updated_data = log_failure(
        "update",
        &schema,
        &table,
        TableService::update_rows(&state.pool, &schema, &table, &data, &filters)
            .await
            .map_err(AppError::from),
    )?;
    Ok(Json(Updated {
        message: "Data updated successfully",
        schema,
        table,
        updated_records: updated_data.row_count,
        updated_data,
    }))
}

pub async fn delete_rows(
    State(state): State<AppState>,
    Path((schema, table)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Deleted>, AppError> {
    let DeleteBody { filters } = parse_body(body)?;
    let deleted_count = log_failure(
        "delete",
        &schema,
        &table,
        TableService::delete_rows(&state.pool, &schema, &table, &filters)
            .await
            .map_err(AppError::from),
    )?;
    Ok(Json(Deleted {
        message: "Data deleted successfully",
        schema,
        table,
        deleted_count,
    }))
}

pub async fn search(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Json<SearchResult>, AppError> {
    let SearchBody { schema, table, filters, limit, offset } = parse_body(body)?;
    let limit = clamp_limit(limit.unwrap_or(DEFAULT_LIMIT));
    let offset = clamp_offset(offset.unwrap_or(0));
    let results = log_failure(
        "search",
        &schema,
        &table,
        TableService::select_rows(&state.pool, &schema, &table, &filters, limit, offset)
            .await
            .map_err(AppError::from),
    )?;
    Ok(Json(SearchResult {
        message: "Search completed successfully",
        search_params: SearchParams { schema, table, filters, limit, offset },
        results,
    }))
}
