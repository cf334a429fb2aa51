use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use strum_macros::{Display, EnumString};

/// Implements field-wise addition so season and career lines are
/// always built by summing raw counts. Sums saturate at `u32::MAX`.
macro_rules! additive_counts {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        impl Add for $name {
            type Output = Self;

            fn add(self, other: Self) -> Self {
                Self {
                    $($field: self.$field.saturating_add(other.$field)),+
                }
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, other: Self) {
                $(self.$field = self.$field.saturating_add(other.$field);)+
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), Add::add)
            }
        }

        impl<'a> Sum<&'a $name> for $name {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                iter.copied().fold(Self::default(), Add::add)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattingCounts {
    pub at_bats: u32,
    pub runs: u32,
    pub hits: u32,
    pub runs_batted_in: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub stolen_bases: u32,
    pub caught_stealing: u32,
    pub hit_by_pitch: u32,
    pub sacrifice_hits: u32,
    pub sacrifice_flies: u32,
    pub grounded_into_double_plays: u32,
    pub intentional_walks: u32,
    pub strikeouts_looking: u32,
}

additive_counts!(BattingCounts {
    at_bats,
    runs,
    hits,
    runs_batted_in,
    doubles,
    triples,
    home_runs,
    walks,
    strikeouts,
    stolen_bases,
    caught_stealing,
    hit_by_pitch,
    sacrifice_hits,
    sacrifice_flies,
    grounded_into_double_plays,
    intentional_walks,
    strikeouts_looking,
});

impl BattingCounts {
    pub fn singles(&self) -> u32 {
        let extra_base_hits = u64::from(self.doubles) + u64::from(self.triples) + u64::from(self.home_runs);
        u32::try_from(u64::from(self.hits).saturating_sub(extra_base_hits)).unwrap_or(0)
    }

    pub fn total_bases(&self) -> u64 {
        u64::from(self.singles())
            + 2 * u64::from(self.doubles)
            + 3 * u64::from(self.triples)
            + 4 * u64::from(self.home_runs)
    }

    pub fn plate_appearances(&self) -> u64 {
        [
            self.at_bats,
            self.walks,
            self.hit_by_pitch,
            self.sacrifice_flies,
            self.sacrifice_hits,
        ]
        .into_iter()
        .map(u64::from)
        .sum()
    }
}

/// Innings pitched are kept as outs recorded; `4.1` innings is 13 outs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchingCounts {
    pub appearances: u32,
    pub games_started: u32,
    pub outs: u32,
    pub hits: u32,
    pub runs: u32,
    pub earned_runs: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub home_runs: u32,
    pub doubles: u32,
    pub triples: u32,
    pub hit_by_pitch: u32,
    pub batters_faced: u32,
    pub wild_pitches: u32,
    pub balks: u32,
    pub intentional_walks: u32,
    pub pitches: u32,
    pub strikes: u32,
    pub complete_games: u32,
    pub shutouts: u32,
    pub wins: u32,
    pub losses: u32,
    pub saves: u32,
}

additive_counts!(PitchingCounts {
    appearances,
    games_started,
    outs,
    hits,
    runs,
    earned_runs,
    walks,
    strikeouts,
    home_runs,
    doubles,
    triples,
    hit_by_pitch,
    batters_faced,
    wild_pitches,
    balks,
    intentional_walks,
    pitches,
    strikes,
    complete_games,
    shutouts,
    wins,
    losses,
    saves,
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldingCounts {
    pub putouts: u32,
    pub assists: u32,
    pub errors: u32,
    pub passed_balls: u32,
    pub catcher_interference: u32,
    pub stolen_bases_allowed: u32,
}

additive_counts!(FieldingCounts {
    putouts,
    assists,
    errors,
    passed_balls,
    catcher_interference,
    stolen_bases_allowed,
});

impl FieldingCounts {
    pub fn total_chances(&self) -> u64 {
        u64::from(self.putouts) + u64::from(self.assists) + u64::from(self.errors)
    }
}

/// Rule set of a league; decides the length of a regulation game.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Ruleset {
    #[default]
    Baseball,
    Softball,
}

impl Ruleset {
    /// Innings ERA is scaled to
    pub fn regulation_innings(&self) -> u32 {
        match self {
            Ruleset::Baseball => 9,
            Ruleset::Softball => 7,
        }
    }
}

/// Role a stat line was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatRole {
    Batting,
    Pitching,
    Fielding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn batting_counts_sum_field_by_field() {
        let first = BattingCounts {
            at_bats: 4,
            hits: 3,
            doubles: 1,
            ..Default::default()
        };
        let second = BattingCounts {
            at_bats: 3,
            hits: 1,
            walks: 1,
            ..Default::default()
        };

        let total: BattingCounts = [first, second].iter().sum();
        assert_eq!(total.at_bats, 7);
        assert_eq!(total.hits, 4);
        assert_eq!(total.doubles, 1);
        assert_eq!(total.walks, 1);
    }

    #[test]
    fn total_bases_weights_extra_base_hits() {
        let counts = BattingCounts {
            hits: 5,
            doubles: 1,
            triples: 1,
            home_runs: 1,
            ..Default::default()
        };
        assert_eq!(counts.singles(), 2);
        assert_eq!(counts.total_bases(), 2 + 2 + 3 + 4);
    }

    #[test]
    fn sums_saturate_instead_of_overflowing() {
        let huge = BattingCounts {
            at_bats: u32::MAX,
            hits: u32::MAX - 1,
            ..Default::default()
        };
        let small = BattingCounts {
            at_bats: 4,
            hits: 2,
            ..Default::default()
        };

        let mut total = huge + small;
        assert_eq!((total.at_bats, total.hits), (u32::MAX, u32::MAX));
        total += small;
        assert_eq!(total.at_bats, u32::MAX);
        assert_eq!([huge, small, small].iter().sum::<BattingCounts>().hits, u32::MAX);

        let fielding = FieldingCounts {
            putouts: u32::MAX,
            assists: u32::MAX,
            errors: 1,
            ..Default::default()
        };
        assert_eq!(fielding.total_chances(), 2 * u64::from(u32::MAX) + 1);
    }

    #[test]
    fn extreme_extra_base_hits_do_not_overflow() {
        let counts = BattingCounts {
            hits: u32::MAX,
            doubles: u32::MAX,
            triples: u32::MAX,
            home_runs: u32::MAX,
            ..Default::default()
        };
        assert_eq!(counts.singles(), 0);
        assert_eq!(counts.total_bases(), 9 * u64::from(u32::MAX));
    }

    #[test]
    fn singles_never_underflow_on_inconsistent_source() {
        let counts = BattingCounts {
            hits: 1,
            home_runs: 2,
            ..Default::default()
        };
        assert_eq!(counts.singles(), 0);
    }

    #[test]
    fn ruleset_parses_case_insensitively() {
        assert_eq!(Ruleset::from_str("Softball").unwrap(), Ruleset::Softball);
        assert_eq!(Ruleset::Softball.regulation_innings(), 7);
        assert_eq!(Ruleset::default().regulation_innings(), 9);
        assert_eq!(Ruleset::Baseball.to_string(), "baseball");
    }
}
