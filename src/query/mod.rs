//! Read-side views: rosters, box scores, player pages and league tables.

pub mod handlers;
mod service;
mod types;

pub use service::{QueryLimits, QueryService};
pub use types::*;
