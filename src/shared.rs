use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::import::ImportService;
use crate::query::QueryService;
use crate::store::StatsStore;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StatsStore>,
    pub import_service: Arc<ImportService>,
    pub query_service: Arc<QueryService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn StatsStore>, config: AppConfig) -> Self {
        let import_service = Arc::new(ImportService::new(
            Arc::clone(&store),
            config.match_policy(),
        ));
        let query_service = Arc::new(QueryService::new(
            Arc::clone(&store),
            config.query_limits(),
        ));

        Self {
            store,
            import_service,
            query_service,
            config,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed input at {location}: {message}")]
    MalformedInput { location: String, message: String },

    #[error("Ambiguous identity: {0}")]
    IdentityAmbiguous(String),

    #[error("Reconciliation conflict: {0}")]
    ReconciliationConflict(String),

    /// The store changed between planning and applying an import
    #[error("Stale import plan: {0}")]
    StalePlan(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::MalformedInput { location, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Malformed input at {}: {}", location, message),
            ),
            AppError::IdentityAmbiguous(msg) => (StatusCode::CONFLICT, msg),
            AppError::ReconciliationConflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::StalePlan(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}
