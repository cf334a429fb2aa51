//! League standings derived from final games. Never persisted.

mod calculator;
mod models;

pub use calculator::compute_standings;
pub use models::{Record, StandingRow, WinningPct};
