//! TableService: generic CRUD over caller-named tables using the safe SQL builder.

mod gateway;
pub mod normalize;
pub use gateway::TableService;
pub use normalize::{Record, ResultSet};
