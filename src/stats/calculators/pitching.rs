use serde::{Deserialize, Serialize};

use super::super::{PitchingCounts, Ruleset};
use super::ratio_or_none;

/// Derived pitching rates. `None` means no outs were recorded, so the
/// rate is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingRates {
    pub innings_pitched: String,
    pub era: Option<f64>,
    pub whip: Option<f64>,
}

impl PitchingRates {
    pub fn from_counts(counts: &PitchingCounts, ruleset: Ruleset) -> Self {
        Self {
            innings_pitched: innings_pitched_display(counts.outs),
            era: earned_run_average(counts, ruleset),
            whip: walks_hits_per_inning(counts),
        }
    }
}

/// ERA = innings-per-game × ER / IP, with IP = outs / 3
pub fn earned_run_average(counts: &PitchingCounts, ruleset: Ruleset) -> Option<f64> {
    ratio_or_none(
        u64::from(ruleset.regulation_innings()) * u64::from(counts.earned_runs) * 3,
        u64::from(counts.outs),
    )
}

/// WHIP = (BB + H) / IP
pub fn walks_hits_per_inning(counts: &PitchingCounts) -> Option<f64> {
    ratio_or_none(
        (u64::from(counts.walks) + u64::from(counts.hits)) * 3,
        u64::from(counts.outs),
    )
}

/// Box-score notation: whole innings, then a dot and the extra outs.
pub fn innings_pitched_display(outs: u32) -> String {
    match outs % 3 {
        0 => format!("{}", outs / 3),
        thirds => format!("{}.{}", outs / 3, thirds),
    }
}
