//! Table API routes. Mount under a prefix such as `/api/db`.

use crate::handlers::tables::{
    delete_rows, insert_row, list_columns, list_schemas, list_tables, search, select_rows, update_rows,
};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/schemas", get(list_schemas))
        .route("/schemas/:schema/tables", get(list_tables))
        .route("/schemas/:schema/tables/:table/columns", get(list_columns))
        .route(
            "/schemas/:schema/tables/:table/data",
            get(select_rows).post(insert_row).put(update_rows).delete(delete_rows),
        )
        .route("/search", post(search))
        .with_state(state)
}
