use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use crate::shared::{AppError, AppState};
use crate::store::models::{League, LeagueUpdate, NewLeague};

/// HTTP handler for creating a league
///
/// POST /api/leagues
/// Body: `{"name": "...", "season": "2025", "ruleset": "softball"}`; season
/// and ruleset are optional.
#[instrument(name = "create_league", skip(state))]
pub async fn create_league(
    State(state): State<AppState>,
    Json(mut request): Json<NewLeague>,
) -> Result<(StatusCode, Json<League>), AppError> {
    request.name = request.name.trim().to_string();
    if request.name.is_empty() {
        return Err(AppError::BadRequest("League name is required".to_string()));
    }
    request.season = request.season.trim().to_string();

    let league = state.store.create_league(request).await?;
    info!(
        league_id = league.id,
        name = %league.name,
        ruleset = %league.ruleset,
        "League created"
    );

    Ok((StatusCode::CREATED, Json(league)))
}

/// GET /api/leagues
#[instrument(name = "list_leagues", skip(state))]
pub async fn list_leagues(State(state): State<AppState>) -> Result<Json<Vec<League>>, AppError> {
    Ok(Json(state.query_service.list_leagues().await?))
}

/// GET /api/leagues/:id
#[instrument(name = "get_league", skip(state))]
pub async fn get_league(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<Json<League>, AppError> {
    Ok(Json(state.query_service.get_league(league_id).await?))
}

/// HTTP handler for editing a league
///
/// PATCH /api/leagues/:id
/// Omitted fields are kept. Changing the ruleset changes ERA for every game.
#[instrument(name = "update_league", skip(state))]
pub async fn update_league(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
    Json(mut request): Json<LeagueUpdate>,
) -> Result<Json<League>, AppError> {
    if let Some(name) = &request.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("League name is required".to_string()));
        }
        request.name = Some(name.to_string());
    }
    request.season = request.season.map(|season| season.trim().to_string());

    let league = state.store.update_league(league_id, request).await?;
    info!(league_id, name = %league.name, ruleset = %league.ruleset, "League updated");
    Ok(Json(league))
}

/// HTTP handler for deleting a league
///
/// DELETE /api/leagues/:id
/// Refused with 409 while the league still has games.
#[instrument(name = "delete_league", skip(state))]
pub async fn delete_league(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_league(league_id).await?;
    info!(league_id, "League deleted");
    Ok(StatusCode::NO_CONTENT)
}
