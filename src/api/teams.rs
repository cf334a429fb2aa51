use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use crate::parser::normalize::normalize_team_code;
use crate::shared::{AppError, AppState};
use crate::store::models::{NewTeam, Team, TeamUpdate};

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("Team {} is required", field)));
    }
    Ok(value.to_string())
}

/// HTTP handler for adding a team to a league before any import names it
///
/// POST /api/leagues/:id/teams
/// Body: `{"code": "TIG", "name": "Tigers", "abbreviation": "TGR"}`
#[instrument(name = "create_team", skip(state))]
pub async fn create_team(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
    Json(request): Json<NewTeam>,
) -> Result<(StatusCode, Json<Team>), AppError> {
    let team = NewTeam {
        code: normalize_team_code(&required(&request.code, "code")?),
        name: required(&request.name, "name")?,
        external_id: request.external_id.filter(|id| !id.trim().is_empty()),
        abbreviation: request
            .abbreviation
            .map(|abbreviation| abbreviation.trim().to_string())
            .filter(|abbreviation| !abbreviation.is_empty()),
    };

    let team = state.store.create_team(league_id, team).await?;
    info!(league_id, team_id = team.id, code = %team.code, "Team created");

    Ok((StatusCode::CREATED, Json(team)))
}

/// HTTP handler for editing a team's code, name or abbreviation
///
/// PATCH /api/teams/:id
/// Omitted fields are kept; `"abbreviation": ""` clears it.
#[instrument(name = "update_team", skip(state))]
pub async fn update_team(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
    Json(request): Json<TeamUpdate>,
) -> Result<Json<Team>, AppError> {
    let update = TeamUpdate {
        code: request
            .code
            .map(|code| required(&code, "code").map(|code| normalize_team_code(&code)))
            .transpose()?,
        name: request.name.map(|name| required(&name, "name")).transpose()?,
        abbreviation: request
            .abbreviation
            .map(|abbreviation| abbreviation.trim().to_string()),
    };

    let team = state.store.update_team(team_id, update).await?;
    info!(team_id, code = %team.code, "Team updated");
    Ok(Json(team))
}

/// DELETE /api/teams/:id
///
/// Refused with 409 while any game references the team.
#[instrument(name = "delete_team", skip(state))]
pub async fn delete_team(
    State(state): State<AppState>,
    Path(team_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.store.delete_team(team_id).await?;
    info!(team_id, "Team deleted");
    Ok(StatusCode::NO_CONTENT)
}
