//! Routers: common (health, readiness, version) and the table API.

mod common;
mod tables;
pub use common::{common_routes, common_routes_with_ready};
pub use tables::table_routes;
