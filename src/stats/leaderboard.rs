use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One ranked row of a leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderRow {
    pub rank: usize,
    pub player_id: i64,
    pub player_name: String,
    pub team_id: i64,
    pub team_name: String,
    pub value: f64,
}

/// A leaderboard candidate before ranking
#[derive(Debug, Clone)]
pub struct LeaderCandidate {
    pub player_id: i64,
    pub player_name: String,
    pub team_id: i64,
    pub team_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Ranks candidates by value, then player name, then player id, and keeps
/// the first `limit` rows. Equal values share a rank.
pub fn rank_leaders(
    mut candidates: Vec<LeaderCandidate>,
    direction: Direction,
    limit: usize,
) -> Vec<LeaderRow> {
    candidates.sort_by(|a, b| {
        let by_value = match direction {
            Direction::HigherIsBetter => b.value.total_cmp(&a.value),
            Direction::LowerIsBetter => a.value.total_cmp(&b.value),
        };
        by_value
            .then_with(|| a.player_name.cmp(&b.player_name))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    let mut rows: Vec<LeaderRow> = Vec::with_capacity(candidates.len().min(limit));
    for (index, candidate) in candidates.into_iter().take(limit).enumerate() {
        let rank = match rows.last() {
            Some(prev) if prev.value.total_cmp(&candidate.value) == Ordering::Equal => prev.rank,
            _ => index + 1,
        };
        rows.push(LeaderRow {
            rank,
            player_id: candidate.player_id,
            player_name: candidate.player_name,
            team_id: candidate.team_id,
            team_name: candidate.team_name,
            value: candidate.value,
        });
    }
    rows
}
