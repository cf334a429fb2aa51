use chrono::NaiveDate;
use serde::Serialize;

use crate::standings::StandingRow;
use crate::stats::{
    BattingCounts, BattingRates, BattingTotals, FieldingCounts, FieldingRates, LeaderRow,
    PitchingCounts, PitchingRates, PitchingTotals, StatTotals,
};
use crate::store::models::{GameStatus, League, LineScore, PlayEvent, Player, Team, Venue};

/// One side of a game in list views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSide {
    pub team_id: i64,
    pub code: String,
    pub name: String,
    pub runs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    pub id: i64,
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub doubleheader: u8,
    pub status: GameStatus,
    pub visitor: GameSide,
    pub home: GameSide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRoster {
    pub team: Team,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerBattingRow {
    pub player_id: i64,
    pub name: String,
    pub uniform_number: Option<String>,
    #[serde(flatten)]
    pub totals: BattingTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBatting {
    pub team: Team,
    pub players: Vec<PlayerBattingRow>,
    pub totals: BattingTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPitchingRow {
    pub player_id: i64,
    pub name: String,
    pub uniform_number: Option<String>,
    #[serde(flatten)]
    pub totals: PitchingTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamPitching {
    pub team: Team,
    pub players: Vec<PlayerPitchingRow>,
    pub totals: PitchingTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxBattingRow {
    pub player_id: i64,
    pub name: String,
    pub position: String,
    pub batting_order: u32,
    pub substitute: bool,
    pub counts: BattingCounts,
    pub rates: BattingRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPitchingRow {
    pub player_id: i64,
    pub name: String,
    pub counts: PitchingCounts,
    pub rates: PitchingRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxFieldingRow {
    pub player_id: i64,
    pub name: String,
    pub position: String,
    pub counts: FieldingCounts,
    pub rates: FieldingRates,
}

/// One team's half of a box score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBox {
    pub team_id: i64,
    pub code: String,
    pub name: String,
    pub line: LineScore,
    pub batting: Vec<BoxBattingRow>,
    pub pitching: Vec<BoxPitchingRow>,
    pub fielding: Vec<BoxFieldingRow>,
    pub totals: StatTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxScore {
    pub game_id: i64,
    pub league_id: i64,
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub doubleheader: u8,
    pub status: GameStatus,
    pub venue: Venue,
    pub visitor: TeamBox,
    pub home: TeamBox,
    pub plays: Vec<PlayEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonLine {
    pub league_id: i64,
    pub league_name: String,
    pub season: String,
    pub team_id: i64,
    pub team_name: String,
    pub totals: StatTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameLogEntry {
    pub game_id: i64,
    pub league_id: i64,
    pub date: NaiveDate,
    pub team_id: i64,
    pub opponent_id: i64,
    pub opponent_name: String,
    pub home: bool,
    /// `"W 5-0"` style result from the player's team's perspective
    pub result: String,
    pub batting: Option<BattingCounts>,
    pub pitching: Option<PitchingCounts>,
    pub fielding: Option<FieldingCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPage {
    pub player: Player,
    pub teams: Vec<Team>,
    pub career: StatTotals,
    pub seasons: Vec<SeasonLine>,
    pub game_log: Vec<GameLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standings {
    pub league: League,
    pub rows: Vec<StandingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueTable {
    pub league: League,
    pub standings: Vec<StandingRow>,
    pub batting_average_leaders: Vec<LeaderRow>,
    pub home_run_leaders: Vec<LeaderRow>,
    pub era_leaders: Vec<LeaderRow>,
    pub strikeout_leaders: Vec<LeaderRow>,
}
