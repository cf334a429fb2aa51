use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::{BattingCounts, FieldingCounts, PitchingCounts};
use crate::store::models::{GameStatus, Half, LineScore, Side, Venue};

/// Canonical, vendor-independent record of one game file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedGame {
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub doubleheader: u8,
    pub venue: Venue,
    pub status: GameStatus,
    pub visitor: ParsedTeam,
    pub home: ParsedTeam,
    pub plays: Vec<ParsedPlay>,
    pub sections: Sections,
}

impl ParsedGame {
    pub fn team(&self, side: Side) -> &ParsedTeam {
        match side {
            Side::Visitor => &self.visitor,
            Side::Home => &self.home,
        }
    }

    pub fn teams(&self) -> [&ParsedTeam; 2] {
        [&self.visitor, &self.home]
    }
}

/// Which optional parts of the document were present at all. An absent
/// section is different from a present but empty one: on re-import only
/// present sections replace what is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub line_score: bool,
    pub batting: bool,
    pub pitching: bool,
    pub fielding: bool,
    pub plays: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTeam {
    pub side: Side,
    /// Trimmed, upper-cased vendor code
    pub code: String,
    pub external_id: Option<String>,
    pub name: String,
    pub line_score: LineScore,
    pub players: Vec<ParsedPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPlayer {
    pub external_id: Option<String>,
    /// Display name after casing and "Last, First" normalization
    pub name: String,
    pub short_name: String,
    pub uniform_number: Option<String>,
    pub bats: String,
    pub throws: String,
    pub class_year: String,
    /// False when the vendor lists the player with `gp="0"`
    pub played: bool,
    pub starter: bool,
    pub substitute: bool,
    pub batting_order: u32,
    pub position: String,
    pub batting: Option<BattingCounts>,
    pub pitching: Option<PitchingCounts>,
    pub fielding: Option<FieldingCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPlay {
    pub inning: u32,
    pub half: Half,
    pub sequence: u32,
    pub outs_before: u32,
    pub batter: String,
    pub pitcher: String,
    pub pitch_sequence: String,
    pub narrative: String,
}
