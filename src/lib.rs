//! dyndb SDK: CRUD and catalog introspection over arbitrary PostgreSQL tables, named at runtime.
//!
//! [`TableService`] is the entry point for library use; [`table_routes`] exposes the same
//! operations over HTTP.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::ColumnDescriptor;
pub use config::Settings;
pub use error::{AccessError, AppError, ConfigError, ErrorKind};
pub use routes::{common_routes, common_routes_with_ready, table_routes};
pub use service::{Record, ResultSet, TableService};
pub use sql::{ColumnMap, FilterMap, RecordMap, ScalarValue};
pub use state::AppState;
