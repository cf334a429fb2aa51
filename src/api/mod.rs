//! HTTP surface. Every route returns JSON; errors use the `{"error": ...}`
//! body produced by [`AppError`](crate::shared::AppError).

mod leagues;
mod teams;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::import::handlers::import_game;
use crate::query::handlers as views;
use crate::shared::AppState;

pub use leagues::{create_league, delete_league, get_league, list_leagues, update_league};
pub use teams::{create_team, delete_team, update_team};

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/api/leagues", get(list_leagues).post(create_league))
        .route(
            "/api/leagues/:id",
            get(get_league).patch(update_league).delete(delete_league),
        )
        .route(
            "/api/leagues/:id/teams",
            get(views::list_teams).post(create_team),
        )
        .route("/api/leagues/:id/games", get(views::list_games))
        .route("/api/leagues/:id/standings", get(views::standings))
        .route("/api/leagues/:id/table", get(views::league_table))
        .route(
            "/api/leagues/:id/import",
            post(import_game).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/teams/:id", patch(update_team).delete(delete_team))
        .route("/api/teams/:id/players", get(views::team_roster))
        .route("/api/teams/:id/batting", get(views::team_batting))
        .route("/api/teams/:id/pitching", get(views::team_pitching))
        .route("/api/games/:id/boxscore", get(views::box_score))
        .route("/api/players/:id", get(views::player_page))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for `oneshot`

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let config = AppConfig {
            max_upload_bytes: 64,
            ..AppConfig::default()
        };
        let app = router(AppStateBuilder::new().with_config(config).build());

        let request = Request::builder()
            .method("POST")
            .uri("/api/leagues/1/import")
            .body(Body::from(vec![b' '; 1024]))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = router(AppStateBuilder::new().build());
        let request = Request::builder()
            .uri("/api/nothing")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
