//! HTTP handlers for catalog listing and table data.

pub mod tables;
pub use tables::*;
