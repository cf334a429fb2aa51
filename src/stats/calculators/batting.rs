use serde::{Deserialize, Serialize};

use super::super::BattingCounts;
use super::ratio_or_zero;

/// Derived batting rates. A zero denominator yields 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BattingRates {
    pub avg: f64,
    pub obp: f64,
    pub slg: f64,
    pub ops: f64,
}

impl BattingRates {
    pub fn from_counts(counts: &BattingCounts) -> Self {
        let avg = batting_average(counts);
        let obp = on_base_percentage(counts);
        let slg = slugging_percentage(counts);

        Self {
            avg,
            obp,
            slg,
            ops: obp + slg,
        }
    }
}

pub fn batting_average(counts: &BattingCounts) -> f64 {
    ratio_or_zero(u64::from(counts.hits), u64::from(counts.at_bats))
}

pub fn on_base_percentage(counts: &BattingCounts) -> f64 {
    let times_on_base = [counts.hits, counts.walks, counts.hit_by_pitch]
        .into_iter()
        .map(u64::from)
        .sum();
    let opportunities = [
        counts.at_bats,
        counts.walks,
        counts.hit_by_pitch,
        counts.sacrifice_flies,
    ]
    .into_iter()
    .map(u64::from)
    .sum();
    ratio_or_zero(times_on_base, opportunities)
}

pub fn slugging_percentage(counts: &BattingCounts) -> f64 {
    ratio_or_zero(counts.total_bases(), u64::from(counts.at_bats))
}
