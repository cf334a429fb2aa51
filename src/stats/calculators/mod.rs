mod batting;
mod fielding;
mod pitching;

pub use batting::{batting_average, on_base_percentage, slugging_percentage, BattingRates};
pub use fielding::{fielding_percentage, FieldingRates};
pub use pitching::{
    earned_run_average, innings_pitched_display, walks_hits_per_inning, PitchingRates,
};

fn ratio_or_zero(numerator: u64, denominator: u64) -> f64 {
    ratio_or_none(numerator, denominator).unwrap_or(0.0)
}

fn ratio_or_none(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}
