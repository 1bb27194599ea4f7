//! Text-to-speech providers
//!
//! Deepgram Aura `speak` is the primary backend; `OpenAI` speech is the
//! alternative. Both return MP3 audio.

use reqwest::header;

use crate::{Error, Result};

/// MIME type of synthesized audio from both providers
pub const TTS_AUDIO_MIME: &str = "audio/mpeg";

const DEEPGRAM_SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";
const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Provider backend plus its voice selection
enum TtsBackend {
    /// Deepgram Aura; the model string is also the voice
    /// (e.g. "aura-asteria-en")
    Deepgram { model: String },
    /// `OpenAI` speech with separate voice and model names
    OpenAi { voice: String, model: String },
}

impl TtsBackend {
    const fn vendor(&self) -> &'static str {
        match self {
            Self::Deepgram { .. } => "Deepgram",
            Self::OpenAi { .. } => "OpenAI",
        }
    }
}

/// Synthesizes reply audio from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    backend: TtsBackend,
}

impl TextToSpeech {
    /// Deepgram Aura synthesis (primary)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new_deepgram(api_key: String, voice_model: String) -> Result<Self> {
        Self::build(api_key, TtsBackend::Deepgram { model: voice_model })
    }

    /// `OpenAI` speech synthesis (alternative)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new_openai(api_key: String, voice: String, model: String) -> Result<Self> {
        Self::build(api_key, TtsBackend::OpenAi { voice, model })
    }

    fn build(api_key: String, backend: TtsBackend) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} TTS requires an API key",
                backend.vendor()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            backend,
        })
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if the provider rejects the request
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let audio = match &self.backend {
            TtsBackend::Deepgram { model } => self.deepgram_speak(text, model).await?,
            TtsBackend::OpenAi { voice, model } => self.openai_speech(text, voice, model).await?,
        };

        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }

    async fn deepgram_speak(&self, text: &str, model: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeakRequest<'a> {
            text: &'a str,
        }

        let response = self
            .client
            .post(DEEPGRAM_SPEAK_URL)
            .query(&[("model", model)])
            .header(header::AUTHORIZATION, format!("Token {}", self.api_key))
            .header(header::ACCEPT, TTS_AUDIO_MIME)
            .json(&SpeakRequest { text })
            .send()
            .await?;

        let response = error_for_status(response, "Deepgram").await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn openai_speech(&self, text: &str, voice: &str, model: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
        }

        let response = self
            .client
            .post(OPENAI_SPEECH_URL)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&SpeechRequest {
                model,
                input: text,
                voice,
            })
            .send()
            .await?;

        let response = error_for_status(response, "OpenAI").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Map a non-2xx provider response to `Error::Tts` with the body text
async fn error_for_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Tts(format!("{provider} TTS error {status}: {body}")))
}
