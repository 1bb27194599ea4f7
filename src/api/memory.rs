//! Conversation history endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::db::Turn;

/// Turns returned by a history fetch
const FETCH_LIMIT: usize = 50;

/// History fetch response
#[derive(Serialize)]
pub struct HistoryResponse {
    pub history: Vec<Turn>,
}

/// Clear request body
#[derive(Deserialize)]
pub struct ClearRequest {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

/// Clear acknowledgment
#[derive(Serialize)]
pub struct ClearResponse {
    pub ok: bool,
}

/// Fetch the most recent turns for a user
async fn get_history(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, MemoryError> {
    let history = state
        .history
        .get_history(&user_id, FETCH_LIMIT)
        .map_err(|e| MemoryError::Internal(e.to_string()))?;

    Ok(Json(HistoryResponse { history }))
}

/// Clear all history for a user. Idempotent: clearing an already-empty
/// history still acknowledges.
async fn clear_history(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ClearRequest>,
) -> Result<Json<ClearResponse>, MemoryError> {
    let user_id = request
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or(MemoryError::BadRequest("userId required"))?;

    state
        .history
        .clear_user(&user_id)
        .map_err(|e| MemoryError::Internal(e.to_string()))?;

    tracing::info!(user_id = %user_id, "history cleared");
    Ok(Json(ClearResponse { ok: true }))
}

/// Build memory router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/memory/clear", post(clear_history))
        .route("/api/memory/{user_id}", get(get_history))
        .with_state(state)
}

/// Memory API errors
#[derive(Debug)]
pub enum MemoryError {
    BadRequest(&'static str),
    Internal(String),
}

impl IntoResponse for MemoryError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}
