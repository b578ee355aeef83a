//! Response bodies for the table API.

use crate::catalog::ColumnDescriptor;
use crate::service::ResultSet;
use crate::sql::ColumnMap;
use serde::Serialize;

#[derive(Serialize)]
pub struct SchemaList {
    pub schemas: Vec<String>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct TableList {
    pub schema: String,
    pub tables: Vec<String>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ColumnList {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct DataPage {
    pub schema: String,
    pub table: String,
    pub filters: ColumnMap,
    pub limit: i64,
    pub offset: i64,
    pub data: ResultSet,
}

#[derive(Serialize)]
pub struct Inserted {
    pub message: &'static str,
    pub schema: String,
    pub table: String,
    pub inserted_data: ResultSet,
}

#[derive(Serialize)]
pub struct Updated {
    pub message: &'static str,
    pub schema: String,
    pub table: String,
    pub updated_records: u64,
    pub updated_data: ResultSet,
}

#[derive(Serialize)]
pub struct Deleted {
    pub message: &'static str,
    pub schema: String,
    pub table: String,
    pub deleted_count: u64,
}

#[derive(Serialize)]
pub struct SearchParams {
    pub schema: String,
    pub table: String,
    pub filters: ColumnMap,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub message: &'static str,
    pub search_params: SearchParams,
    pub results: ResultSet,
}
