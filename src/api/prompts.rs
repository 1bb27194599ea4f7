//! Prompt listing endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;

/// Prompt list response
#[derive(Serialize)]
pub struct PromptListResponse {
    pub prompts: Vec<String>,
}

/// List available prompt names
async fn list_prompts(State(state): State<Arc<ApiState>>) -> Json<PromptListResponse> {
    Json(PromptListResponse {
        prompts: state.prompts.list(),
    })
}

/// Build prompts router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/prompts", get(list_prompts))
        .with_state(state)
}
