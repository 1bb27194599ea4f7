//! Ad-hoc text-to-speech endpoint
//!
//! Synthesizes arbitrary text outside the conversational loop; the
//! voice session uses it for the session-start greeting.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::voice::TTS_AUDIO_MIME;

/// Query parameters for synthesis
#[derive(Deserialize)]
pub struct TtsQuery {
    pub text: Option<String>,
}

/// Synthesis response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub audio_base64: String,
    pub audio_mime: &'static str,
}

/// Synthesize the given text to speech
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TtsQuery>,
) -> Result<Json<TtsResponse>, TtsError> {
    let tts = state
        .tts
        .as_ref()
        .ok_or(TtsError::NotConfigured("TTS not configured"))?;

    let text = query
        .text
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Hello.".to_string());

    let audio = tts
        .synthesize(&text)
        .await
        .map_err(|e| TtsError::SynthesisFailed(e.to_string()))?;

    Ok(Json(TtsResponse {
        audio_base64: base64::engine::general_purpose::STANDARD.encode(audio),
        audio_mime: TTS_AUDIO_MIME,
    }))
}

/// Build TTS router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/tts", get(synthesize))
        .with_state(state)
}

/// TTS API errors
#[derive(Debug)]
pub enum TtsError {
    NotConfigured(&'static str),
    SynthesisFailed(String),
}

impl IntoResponse for TtsError {
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
            Self::NotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                msg.to_string(),
            ),
            Self::SynthesisFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "synthesis_failed", msg)
            }
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
