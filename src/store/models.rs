use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::stats::{BattingCounts, FieldingCounts, PitchingCounts, Ruleset};

/// A league groups the teams and games of one season of play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub season: String,
    pub ruleset: Ruleset,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLeague {
    pub name: String,
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub ruleset: Ruleset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub league_id: i64,
    /// Vendor team code, unique within a league
    pub code: String,
    pub external_id: Option<String>,
    pub name: String,
    pub abbreviation: Option<String>,
}

/// Fields of a league left untouched are `None`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeagueUpdate {
    pub name: Option<String>,
    pub season: Option<String>,
    pub ruleset: Option<Ruleset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTeam {
    pub code: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub name: String,
    /// Alternate code some vendors print for this team
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Partial edit of a team. An empty `abbreviation` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub external_id: Option<String>,
    pub name: String,
    pub short_name: String,
    pub uniform_number: Option<String>,
    pub bats: String,
    pub throws: String,
    pub class_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub external_id: Option<String>,
    pub name: String,
    pub short_name: String,
    pub uniform_number: Option<String>,
    pub bats: String,
    pub throws: String,
    pub class_year: String,
}

impl NewPlayer {
    pub fn into_player(self, id: i64) -> Player {
        Player {
            id,
            external_id: self.external_id,
            name: self.name,
            short_name: self.short_name,
            uniform_number: self.uniform_number,
            bats: self.bats,
            throws: self.throws,
            class_year: self.class_year,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Scheduled,
    Final,
    Suspended,
}

impl GameStatus {
    /// Only final games feed standings and aggregates
    pub fn is_final(&self) -> bool {
        matches!(self, GameStatus::Final)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Visitor,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Half {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineScore {
    pub runs: u32,
    pub hits: u32,
    pub errors: u32,
    pub left_on_base: u32,
    /// Per-inning runs exactly as the vendor wrote them (`"X"` for an unplayed half)
    pub innings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub location: String,
    pub stadium: String,
    pub duration: String,
    pub attendance: u32,
    pub scheduled_innings: Option<u32>,
    pub weather: String,
    pub league_game: bool,
    pub used_dh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub league_id: i64,
    pub external_id: Option<String>,
    pub visitor_team_id: i64,
    pub home_team_id: i64,
    pub date: NaiveDate,
    pub start_time: String,
    /// 0 for a single game, otherwise 1 or 2
    pub doubleheader: u8,
    pub venue: Venue,
    pub status: GameStatus,
    pub visitor_line: LineScore,
    pub home_line: LineScore,
    /// SHA-256 of the document this game was last imported from
    pub source_digest: String,
    pub imported_at: DateTime<Utc>,
}

impl Game {
    pub fn team_side(&self, team_id: i64) -> Option<Side> {
        if team_id == self.visitor_team_id {
            Some(Side::Visitor)
        } else if team_id == self.home_team_id {
            Some(Side::Home)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, team_id: i64) -> Option<i64> {
        self.team_side(team_id).map(|side| match side {
            Side::Visitor => self.home_team_id,
            Side::Home => self.visitor_team_id,
        })
    }

    pub fn runs_for(&self, side: Side) -> u32 {
        match side {
            Side::Visitor => self.visitor_line.runs,
            Side::Home => self.home_line.runs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattingLine {
    pub game_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub batting_order: u32,
    pub position: String,
    pub starter: bool,
    pub substitute: bool,
    pub counts: BattingCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingLine {
    pub game_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub counts: PitchingCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldingLine {
    pub game_id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub position: String,
    pub counts: FieldingCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub game_id: i64,
    /// Position in the document; the authoritative order
    pub ordinal: u32,
    pub inning: u32,
    pub half: Half,
    /// Sequence number as given by the vendor
    pub sequence: u32,
    pub outs_before: u32,
    pub batter: String,
    pub pitcher: String,
    pub pitch_sequence: String,
    pub narrative: String,
}

/// Every stat line in some scope, grouped by role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatLines {
    pub batting: Vec<BattingLine>,
    pub pitching: Vec<PitchingLine>,
    pub fielding: Vec<FieldingLine>,
}

impl StatLines {
    pub fn retain_games(&mut self, keep: impl Fn(i64) -> bool) {
        self.batting.retain(|line| keep(line.game_id));
        self.pitching.retain(|line| keep(line.game_id));
        self.fielding.retain(|line| keep(line.game_id));
    }
}

/// A game together with everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetail {
    pub game: Game,
    pub lines: StatLines,
    pub plays: Vec<PlayEvent>,
}
