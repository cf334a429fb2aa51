use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Wins, losses and ties over some set of games
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl Record {
    pub fn games(&self) -> u32 {
        self.wins.saturating_add(self.losses).saturating_add(self.ties)
    }

    /// Ties count as half a win
    pub fn pct(&self) -> WinningPct {
        WinningPct {
            half_wins: 2 * u64::from(self.wins) + u64::from(self.ties),
            half_games: 2 * (u64::from(self.wins) + u64::from(self.losses) + u64::from(self.ties)),
        }
    }

    pub fn record_result(&mut self, scored: u32, allowed: u32) {
        match scored.cmp(&allowed) {
            Ordering::Greater => self.wins = self.wins.saturating_add(1),
            Ordering::Less => self.losses = self.losses.saturating_add(1),
            Ordering::Equal => self.ties = self.ties.saturating_add(1),
        }
    }
}

/// Winning percentage kept as an exact fraction so that equal records
/// compare equal. A record with no games is worth 0, level with 0-N.
#[derive(Debug, Clone, Copy)]
pub struct WinningPct {
    half_wins: u64,
    half_games: u64,
}

impl WinningPct {
    pub fn value(&self) -> f64 {
        if self.half_games == 0 {
            0.0
        } else {
            self.half_wins as f64 / self.half_games as f64
        }
    }
}

impl Ord for WinningPct {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = u128::from(self.half_wins) * u128::from(other.half_games.max(1));
        let rhs = u128::from(other.half_wins) * u128::from(self.half_games.max(1));
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for WinningPct {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for WinningPct {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WinningPct {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub rank: usize,
    pub team_id: i64,
    pub team_code: String,
    pub team_name: String,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub pct: f64,
    pub games_behind: f64,
    pub runs_scored: u32,
    pub runs_allowed: u32,
    pub run_differential: i64,
    pub home: Record,
    pub away: Record,
    /// Current run of identical results, e.g. `"W3"`; empty before any game
    pub streak: String,
}
