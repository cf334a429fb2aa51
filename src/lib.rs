// Library crate for the diamondstats server
// This file exposes the public API for integration tests

pub mod api;
pub mod config;
pub mod identity;
pub mod import;
pub mod parser;
pub mod query;
pub mod shared;
pub mod standings;
pub mod stats;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use api::router;
pub use config::AppConfig;
pub use import::{ImportAction, ImportReport, ImportService};
pub use parser::{parse_game_xml, ParsedGame};
pub use query::{QueryLimits, QueryService};
pub use shared::{AppError, AppState};
pub use store::{InMemoryStatsStore, PostgresStatsStore, StatsStore};
