//! Stats aggregation engine.
//!
//! Raw counting stats live in [`models`]; derived rates are computed on
//! demand by [`calculators`] and are never stored.

pub mod aggregate;
pub mod calculators;
pub mod leaderboard;
pub mod models;

pub use aggregate::{BattingTotals, FieldingTotals, PitchingTotals, StatTotals};
pub use calculators::{BattingRates, FieldingRates, PitchingRates};
pub use leaderboard::{rank_leaders, Direction, LeaderCandidate, LeaderRow};
pub use models::*;
