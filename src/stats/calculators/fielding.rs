use serde::{Deserialize, Serialize};

use super::super::FieldingCounts;
use super::ratio_or_none;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldingRates {
    pub total_chances: u64,
    /// `None` when the fielder had no chances
    pub fpct: Option<f64>,
}

impl FieldingRates {
    pub fn from_counts(counts: &FieldingCounts) -> Self {
        Self {
            total_chances: counts.total_chances(),
            fpct: fielding_percentage(counts),
        }
    }
}

/// FPCT = (PO + A) / (PO + A + E)
pub fn fielding_percentage(counts: &FieldingCounts) -> Option<f64> {
    ratio_or_none(
        u64::from(counts.putouts) + u64::from(counts.assists),
        counts.total_chances(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_fielder_is_perfect() {
        let counts = FieldingCounts {
            putouts: 5,
            assists: 2,
            ..Default::default()
        };
        assert_eq!(fielding_percentage(&counts), Some(1.0));
    }

    #[test]
    fn errors_reduce_percentage() {
        let counts = FieldingCounts {
            putouts: 6,
            assists: 3,
            errors: 1,
            ..Default::default()
        };
        let rates = FieldingRates::from_counts(&counts);
        assert_eq!(rates.total_chances, 10);
        assert_eq!(rates.fpct, Some(0.9));
    }

    #[test]
    fn no_chances_is_undefined() {
        assert_eq!(fielding_percentage(&FieldingCounts::default()), None);
    }
}
