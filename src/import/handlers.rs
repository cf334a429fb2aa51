use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::plan::{ImportAction, ImportReport};
use crate::shared::{AppError, AppState};

/// HTTP handler for importing one game document
///
/// POST /api/leagues/:id/import
/// The body is the raw XML. Returns 201 when a game was inserted and 200
/// when an existing game was updated or left unchanged.
#[instrument(name = "import_game", skip(state, body), fields(bytes = body.len()))]
pub async fn import_game(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<ImportReport>), AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty import body".to_string()));
    }

    let report = state.import_service.import_xml(league_id, &body).await?;

    info!(
        league_id,
        game_id = report.game_id,
        action = %report.action,
        "Import finished"
    );

    let status = match report.action {
        ImportAction::Inserted => StatusCode::CREATED,
        ImportAction::Updated | ImportAction::Unchanged => StatusCode::OK,
    };
    Ok((status, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use crate::stats::Ruleset;
    use crate::store::models::NewLeague;
    use axum::{body::Body, http::Request, Router};
    use tower::ServiceExt; // for `oneshot`

    const SAMPLE: &str = include_str!("../../tests/fixtures/sample_game.xml");

    async fn app_with_league() -> (Router, i64) {
        let state = AppStateBuilder::new().build();
        let league = state
            .store
            .create_league(NewLeague {
                name: "Spring League".to_string(),
                season: "2025".to_string(),
                ruleset: Ruleset::Softball,
            })
            .await
            .unwrap();

        let app = Router::new()
            .route(
                "/api/leagues/:id/import",
                axum::routing::post(import_game),
            )
            .with_state(state);
        (app, league.id)
    }

    fn post(league_id: i64, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/leagues/{}/import", league_id))
            .header("content-type", "application/xml")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn first_import_creates_then_repeat_is_unchanged() {
        let (app, league_id) = app_with_league().await;

        let response = app.clone().oneshot(post(league_id, SAMPLE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let first = json(response).await;
        assert_eq!(first["action"], "inserted");
        assert_eq!(first["teams_created"], 2);

        let response = app.oneshot(post(league_id, SAMPLE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let second = json(response).await;
        assert_eq!(second["action"], "unchanged");
        assert_eq!(second["game_id"], first["game_id"]);
    }

    #[tokio::test]
    async fn malformed_document_is_unprocessable() {
        let (app, league_id) = app_with_league().await;

        let response = app.oneshot(post(league_id, "<bsgame><venue")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("line"));
    }

    #[tokio::test]
    async fn unknown_league_is_not_found() {
        let (app, _) = app_with_league().await;

        let response = app.oneshot(post(4242, SAMPLE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let (app, league_id) = app_with_league().await;

        let response = app.oneshot(post(league_id, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
