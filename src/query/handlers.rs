use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, instrument};

use super::types::{
    BoxScore, GameSummary, LeagueTable, PlayerPage, Standings, TeamBatting, TeamPitching,
    TeamRoster,
};
use crate::shared::{AppError, AppState};
use crate::store::models::Team;

/// GET /api/leagues/:id/teams
#[instrument(name = "list_teams", skip(state))]
pub async fn list_teams(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<Json<Vec<Team>>, AppError> {
    let teams = state.query_service.list_teams(league_id).await?;
    debug!(team_count = teams.len(), "Teams listed");
    Ok(Json(teams))
}

/// GET /api/leagues/:id/games
#[instrument(name = "list_games", skip(state))]
pub async fn list_games(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    let games = state.query_service.list_games(league_id).await?;
    debug!(game_count = games.len(), "Games listed");
    Ok(Json(games))
}

/// GET /api/leagues/:id/standings
#[instrument(name = "standings", skip(state))]
pub async fn standings(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<Json<Standings>, AppError> {
    Ok(Json(state.query_service.standings(league_id).await?))
}

/// GET /api/leagues/:id/table
///
/// Standings plus batting average, home run, ERA and strikeout leaders.
#[instrument(name = "league_table", skip(state))]
pub async fn league_table(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<Json<LeagueTable>, AppError> {
    Ok(Json(state.query_service.league_table(league_id).await?))
}

/// GET /api/teams/:id/players
#[instrument(name = "team_roster", skip(state))]
pub async fn team_roster(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamRoster>, AppError> {
    Ok(Json(state.query_service.team_roster(team_id).await?))
}

/// GET /api/teams/:id/batting
#[instrument(name = "team_batting", skip(state))]
pub async fn team_batting(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamBatting>, AppError> {
    Ok(Json(state.query_service.team_batting(team_id).await?))
}

/// GET /api/teams/:id/pitching
#[instrument(name = "team_pitching", skip(state))]
pub async fn team_pitching(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
) -> Result<Json<TeamPitching>, AppError> {
    Ok(Json(state.query_service.team_pitching(team_id).await?))
}

/// GET /api/games/:id/boxscore
#[instrument(name = "box_score", skip(state))]
pub async fn box_score(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Json<BoxScore>, AppError> {
    Ok(Json(state.query_service.box_score(game_id).await?))
}

/// GET /api/players/:id
#[instrument(name = "player_page", skip(state))]
pub async fn player_page(
    State(state): State<AppState>,
    Path(player_id): Path<i64>,
) -> Result<Json<PlayerPage>, AppError> {
    Ok(Json(state.query_service.player_page(player_id).await?))
}
