//! Voice exchange endpoint: the STT -> LLM -> TTS pipeline
//!
//! Accepts one utterance clip, transcribes it, generates a reply from
//! the transcript plus recent history, synthesizes the reply, and
//! returns text and audio together.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::Engine;
use serde::Serialize;

use super::ApiState;
use crate::db::TurnRole;
use crate::llm::HISTORY_WINDOW;
use crate::voice::TTS_AUDIO_MIME;

/// Reply used when transcription produced no text; skips the LLM but
/// still goes through TTS so the user hears something
const FALLBACK_REPLY: &str = "I didn't catch that. Could you try again?";

/// Content type assumed when the client sends none
const DEFAULT_CONTENT_TYPE: &str = "audio/webm";

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/voice", post(exchange))
        .with_state(state)
}

/// Voice exchange response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub transcript: String,
    pub reply: String,
    pub audio_base64: String,
    pub audio_mime: &'static str,
}

/// Fields parsed out of the multipart submission
#[derive(Default)]
struct Submission {
    audio: Option<Vec<u8>>,
    user_id: Option<String>,
    prompt_name: Option<String>,
    content_type: Option<String>,
}

impl Submission {
    async fn parse(mut multipart: Multipart) -> Result<Self, VoiceError> {
        let mut submission = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| VoiceError::BadRequest("malformed multipart body"))?
        {
            let name = field.name().map(ToString::to_string);
            match name.as_deref() {
                Some("audio") => {
                    let mime = field.content_type().map(ToString::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|_| VoiceError::BadRequest("malformed audio field"))?;
                    submission.audio = Some(bytes.to_vec());
                    if submission.content_type.is_none() {
                        submission.content_type = mime;
                    }
                }
                Some("userId") => submission.user_id = field.text().await.ok(),
                Some("promptName") => submission.prompt_name = field.text().await.ok(),
                Some("contentType") => submission.content_type = field.text().await.ok(),
                _ => {}
            }
        }

        Ok(submission)
    }
}

/// Run one utterance through the pipeline
async fn exchange(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<ExchangeResponse>, VoiceError> {
    let stt = state
        .stt
        .as_ref()
        .ok_or(VoiceError::NotConfigured("STT not configured"))?;
    let tts = state
        .tts
        .as_ref()
        .ok_or(VoiceError::NotConfigured("TTS not configured"))?;
    let chat = state
        .chat
        .as_ref()
        .ok_or(VoiceError::NotConfigured("chat not configured"))?;

    let submission = Submission::parse(multipart).await?;

    let audio = submission
        .audio
        .filter(|bytes| !bytes.is_empty())
        .ok_or(VoiceError::BadRequest("audio file missing"))?;

    let user_id = submission
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "anonymous".to_string());
    let prompt_name = submission
        .prompt_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| crate::prompts::DEFAULT_PROMPT_NAME.to_string());
    let content_type = submission
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let transcript = stt
        .transcribe(audio, &content_type)
        .await
        .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;

    let reply = if transcript.is_empty() {
        // Nothing intelligible downstream: canned fallback instead of
        // a failure; history is left untouched
        FALLBACK_REPLY.to_string()
    } else {
        // History is fetched before this exchange's turns are appended;
        // the transcript rides along as the final user message
        let system_prompt = state.prompts.load(&prompt_name);
        let history = state
            .history
            .get_history(&user_id, HISTORY_WINDOW)
            .map_err(|e| VoiceError::Internal(e.to_string()))?;

        let reply = chat
            .reply(&system_prompt, &history, &transcript)
            .await
            .map_err(|e| VoiceError::CompletionFailed(e.to_string()))?;

        state
            .history
            .append_turn(&user_id, TurnRole::User, &transcript)
            .map_err(|e| VoiceError::Internal(e.to_string()))?;
        state
            .history
            .append_turn(&user_id, TurnRole::Assistant, &reply)
            .map_err(|e| VoiceError::Internal(e.to_string()))?;

        reply
    };

    // The fallback reply still goes through TTS so the user hears it
    let reply_audio = tts
        .synthesize(&reply)
        .await
        .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;

    tracing::info!(user_id = %user_id, transcript = %transcript, reply = %reply, "voice exchange complete");

    Ok(Json(ExchangeResponse {
        transcript,
        reply,
        audio_base64: base64::engine::general_purpose::STANDARD.encode(reply_audio),
        audio_mime: TTS_AUDIO_MIME,
    }))
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    TranscriptionFailed(String),
    CompletionFailed(String),
    SynthesisFailed(String),
    Internal(String),
}

impl IntoResponse for VoiceError {
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
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::TranscriptionFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transcription_failed",
                msg,
            ),
            Self::CompletionFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "completion_failed", msg)
            }
            Self::SynthesisFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "synthesis_failed", msg)
            }
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
