//! Aggregation of raw stat lines into totals.
//!
//! Counts are summed first and rates are derived once from the sums, so a
//! season line is never an average of per-game ratios.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::store::models::{BattingLine, FieldingLine, PitchingLine, StatLines};

use super::calculators::{BattingRates, FieldingRates, PitchingRates};
use super::{BattingCounts, FieldingCounts, PitchingCounts, Ruleset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattingTotals {
    pub games: u32,
    pub counts: BattingCounts,
    pub rates: BattingRates,
}

impl BattingTotals {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a BattingLine>) -> Self {
        let mut games = BTreeSet::new();
        let mut counts = BattingCounts::default();
        for line in lines {
            games.insert(line.game_id);
            counts += line.counts;
        }

        Self {
            games: games.len() as u32,
            rates: BattingRates::from_counts(&counts),
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingTotals {
    pub games: u32,
    pub counts: PitchingCounts,
    pub rates: PitchingRates,
}

impl PitchingTotals {
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a PitchingLine>,
        ruleset: Ruleset,
    ) -> Self {
        let mut games = BTreeSet::new();
        let mut counts = PitchingCounts::default();
        for line in lines {
            games.insert(line.game_id);
            counts += line.counts;
        }

        Self {
            games: games.len() as u32,
            rates: PitchingRates::from_counts(&counts, ruleset),
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldingTotals {
    pub games: u32,
    pub counts: FieldingCounts,
    pub rates: FieldingRates,
}

impl FieldingTotals {
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a FieldingLine>) -> Self {
        let mut games = BTreeSet::new();
        let mut counts = FieldingCounts::default();
        for line in lines {
            games.insert(line.game_id);
            counts += line.counts;
        }

        Self {
            games: games.len() as u32,
            rates: FieldingRates::from_counts(&counts),
            counts,
        }
    }
}

/// Batting, pitching and fielding totals over one scope. A role with no
/// lines has `games == 0` rather than being left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatTotals {
    pub batting: BattingTotals,
    pub pitching: PitchingTotals,
    pub fielding: FieldingTotals,
}

impl StatTotals {
    pub fn from_lines(lines: &StatLines, ruleset: Ruleset) -> Self {
        Self {
            batting: BattingTotals::from_lines(&lines.batting),
            pitching: PitchingTotals::from_lines(&lines.pitching, ruleset),
            fielding: FieldingTotals::from_lines(&lines.fielding),
        }
    }
}

/// Splits lines by player, keyed in ascending player id order.
pub fn lines_by_player(lines: &StatLines) -> BTreeMap<i64, StatLines> {
    let mut grouped: BTreeMap<i64, StatLines> = BTreeMap::new();
    for line in &lines.batting {
        grouped
            .entry(line.player_id)
            .or_default()
            .batting
            .push(line.clone());
    }
    for line in &lines.pitching {
        grouped
            .entry(line.player_id)
            .or_default()
            .pitching
            .push(line.clone());
    }
    for line in &lines.fielding {
        grouped
            .entry(line.player_id)
            .or_default()
            .fielding
            .push(line.clone());
    }
    grouped
}

/// Keeps only the lines belonging to one team.
pub fn lines_for_team(lines: &StatLines, team_id: i64) -> StatLines {
    StatLines {
        batting: lines
            .batting
            .iter()
            .filter(|line| line.team_id == team_id)
            .cloned()
            .collect(),
        pitching: lines
            .pitching
            .iter()
            .filter(|line| line.team_id == team_id)
            .cloned()
            .collect(),
        fielding: lines
            .fielding
            .iter()
            .filter(|line| line.team_id == team_id)
            .cloned()
            .collect(),
    }
}
