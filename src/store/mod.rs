//! Data access: domain records plus the [`StatsStore`] trait with an
//! in-memory and a PostgreSQL implementation.

mod memory;
pub mod models;
mod postgres;
mod repository;

pub use memory::InMemoryStatsStore;
pub use postgres::PostgresStatsStore;
pub use repository::{ImportSnapshot, SnapshotRequest, StatsStore};
