//! Speech-to-text providers
//!
//! Deepgram `listen` is the primary backend; `OpenAI` Whisper is the
//! alternative. Both take one encoded clip and return plain transcript
//! text.

use reqwest::header;

use crate::{Error, Result};

const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";
const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Deepgram `listen` response, pared down to the transcript path
#[derive(serde::Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(serde::Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(serde::Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(serde::Deserialize)]
struct ListenAlternative {
    transcript: String,
}

/// Whisper transcription response
#[derive(serde::Deserialize)]
struct WhisperTranscription {
    text: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Deepgram,
    Whisper,
}

/// Transcribes utterance clips to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Deepgram-backed transcription (primary)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        Self::build(SttProvider::Deepgram, api_key, model)
    }

    /// Whisper-backed transcription (alternative)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        Self::build(SttProvider::Whisper, api_key, model)
    }

    fn build(provider: SttProvider, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{provider:?} STT requires an API key"
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider,
        })
    }

    /// Transcribe one clip; `content_type` is the clip's MIME type as
    /// negotiated by the recorder
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` if the provider rejects the clip or the
    /// response cannot be decoded
    pub async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> Result<String> {
        tracing::debug!(bytes = audio.len(), provider = ?self.provider, "transcribing clip");

        let transcript = match self.provider {
            SttProvider::Deepgram => self.deepgram_listen(audio, content_type).await?,
            SttProvider::Whisper => self.whisper_transcribe(audio).await?,
        };

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    async fn deepgram_listen(&self, audio: Vec<u8>, content_type: &str) -> Result<String> {
        let response = self
            .client
            .post(DEEPGRAM_LISTEN_URL)
            .query(&[("model", self.model.as_str()), ("smart_format", "true")])
            .header(header::AUTHORIZATION, format!("Token {}", self.api_key))
            .header(header::CONTENT_TYPE, content_type)
            .body(audio)
            .send()
            .await?;

        let response = error_for_status(response, "Deepgram").await?;
        let decoded: ListenResponse = response.json().await?;

        Ok(decoded
            .results
            .channels
            .first()
            .and_then(|channel| channel.alternatives.first())
            .map(|alt| alt.transcript.trim().to_owned())
            .unwrap_or_default())
    }

    async fn whisper_transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let clip = reqwest::multipart::Part::bytes(audio)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", clip)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(WHISPER_URL)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let response = error_for_status(response, "Whisper").await?;
        let decoded: WhisperTranscription = response.json().await?;
        Ok(decoded.text.trim().to_owned())
    }
}

/// Map a non-2xx provider response to `Error::Stt` with the body text
async fn error_for_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(%status, body = %body, "{provider} transcription failed");
    Err(Error::Stt(format!("{provider} error {status}: {body}")))
}
