use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::models::{
    Game, GameDetail, League, LeagueUpdate, NewLeague, NewTeam, Player, StatLines, Team,
    TeamUpdate,
};
use crate::import::{AppliedImport, ImportPlan};
use crate::shared::AppError;

/// What the import planner needs to see of the store
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRequest {
    pub league_id: i64,
    pub date: NaiveDate,
    pub game_external_id: Option<String>,
    pub player_external_ids: Vec<String>,
}

/// Read-only view of one league taken before planning an import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSnapshot {
    pub league_id: i64,
    pub teams: Vec<Team>,
    /// Keyed by team id
    pub rosters: HashMap<i64, Vec<Player>>,
    /// Players anywhere in the store sharing a vendor id with the document
    pub known_players: Vec<Player>,
    /// Games in the league on the document's date or with its vendor id
    pub games: Vec<Game>,
}

/// Persistence for leagues, games and stat lines.
///
/// `apply_import` is the only write path for game data and must be atomic:
/// either the whole plan is visible afterwards or none of it is.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn create_league(&self, league: NewLeague) -> Result<League, AppError>;
    async fn list_leagues(&self) -> Result<Vec<League>, AppError>;
    async fn get_league(&self, league_id: i64) -> Result<Option<League>, AppError>;
    async fn update_league(&self, league_id: i64, update: LeagueUpdate)
        -> Result<League, AppError>;
    /// Fails with `Conflict` while the league still has games
    async fn delete_league(&self, league_id: i64) -> Result<(), AppError>;

    /// Fails with `Conflict` when the league already has a team with this code
    async fn create_team(&self, league_id: i64, team: NewTeam) -> Result<Team, AppError>;
    async fn update_team(&self, team_id: i64, update: TeamUpdate) -> Result<Team, AppError>;
    /// Fails with `Conflict` while any game references the team
    async fn delete_team(&self, team_id: i64) -> Result<(), AppError>;
    async fn list_teams(&self, league_id: i64) -> Result<Vec<Team>, AppError>;
    async fn get_team(&self, team_id: i64) -> Result<Option<Team>, AppError>;
    async fn team_roster(&self, team_id: i64) -> Result<Vec<Player>, AppError>;

    async fn get_player(&self, player_id: i64) -> Result<Option<Player>, AppError>;
    /// Every team the player has been rostered on
    async fn player_teams(&self, player_id: i64) -> Result<Vec<Team>, AppError>;

    async fn list_games(&self, league_id: i64) -> Result<Vec<Game>, AppError>;
    async fn get_game(&self, game_id: i64) -> Result<Option<Game>, AppError>;
    async fn game_detail(&self, game_id: i64) -> Result<Option<GameDetail>, AppError>;

    async fn league_lines(&self, league_id: i64) -> Result<StatLines, AppError>;
    async fn player_lines(&self, player_id: i64) -> Result<StatLines, AppError>;

    async fn import_snapshot(&self, request: &SnapshotRequest)
        -> Result<ImportSnapshot, AppError>;
    async fn apply_import(&self, plan: &ImportPlan) -> Result<AppliedImport, AppError>;
}
