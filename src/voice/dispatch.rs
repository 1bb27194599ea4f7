//! Utterance dispatch to the relay pipeline
//!
//! Sends each finalized clip to the relay's voice endpoint and returns
//! the transcript, reply text, and synthesized reply audio.

use base64::Engine;
use serde::Deserialize;

use super::recorder::UtteranceClip;
use crate::{Error, Result};

/// One completed voice exchange returned by the relay
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceExchange {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub audio_base64: String,
    #[serde(default)]
    pub audio_mime: String,
}

impl VoiceExchange {
    /// Decode the reply audio; `None` when the relay returned none
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid base64
    pub fn decode_audio(&self) -> Result<Option<Vec<u8>>> {
        if self.audio_base64.is_empty() {
            return Ok(None);
        }

        base64::engine::general_purpose::STANDARD
            .decode(&self.audio_base64)
            .map(Some)
            .map_err(|e| Error::Dispatch(format!("invalid reply audio: {e}")))
    }
}

/// Synthesized audio from the ad-hoc TTS endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsReply {
    #[serde(default)]
    audio_base64: String,
}

/// Error body returned by the relay on failure
#[derive(Debug, Deserialize)]
struct RelayError {
    error: serde_json::Value,
}

/// Sends finalized utterances to the relay pipeline
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    prompt_name: String,
}

impl Dispatcher {
    /// Create a dispatcher posting to `base_url` (e.g.
    /// `http://127.0.0.1:3000`)
    #[must_use]
    pub fn new(base_url: String, user_id: String, prompt_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
            prompt_name,
        }
    }

    /// Send one clip through the pipeline and await the exchange
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the relay reports an
    /// error; callers log one line and keep listening.
    pub async fn send(&self, clip: UtteranceClip) -> Result<VoiceExchange> {
        let url = format!("{}/api/voice", self.base_url);

        let part = reqwest::multipart::Part::bytes(clip.bytes)
            .file_name("utterance.wav")
            .mime_str(clip.mime)
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("audio", part)
            .text("userId", self.user_id.clone())
            .text("promptName", self.prompt_name.clone())
            .text("contentType", clip.mime);

        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<RelayError>()
                .await
                .map_or_else(|_| status.to_string(), |e| e.error.to_string());
            return Err(Error::Dispatch(format!("relay error {status}: {message}")));
        }

        let exchange: VoiceExchange = response.json().await?;
        Ok(exchange)
    }

    /// Fetch ad-hoc synthesized speech (the session-start greeting)
    ///
    /// # Errors
    ///
    /// Returns error if the request or decode fails
    pub async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/api/tts", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("text", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Dispatch(format!("tts error {status}")));
        }

        let reply: TtsReply = response.json().await?;
        if reply.audio_base64.is_empty() {
            return Ok(None);
        }

        base64::engine::general_purpose::STANDARD
            .decode(&reply.audio_base64)
            .map(Some)
            .map_err(|e| Error::Dispatch(format!("invalid greeting audio: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_decodes_reply_audio() {
        let exchange = VoiceExchange {
            transcript: "hello".to_string(),
            reply: "hi".to_string(),
            audio_base64: base64::engine::general_purpose::STANDARD.encode(b"mp3-bytes"),
            audio_mime: "audio/mpeg".to_string(),
        };

        let audio = exchange.decode_audio().unwrap().unwrap();
        assert_eq!(audio, b"mp3-bytes");
    }

    #[test]
    fn test_exchange_without_audio() {
        let exchange = VoiceExchange {
            transcript: String::new(),
            reply: String::new(),
            audio_base64: String::new(),
            audio_mime: String::new(),
        };

        assert!(exchange.decode_audio().unwrap().is_none());
    }

    #[test]
    fn test_invalid_audio_is_an_error() {
        let exchange = VoiceExchange {
            transcript: String::new(),
            reply: String::new(),
            audio_base64: "not base64!!!".to_string(),
            audio_mime: "audio/mpeg".to_string(),
        };

        assert!(exchange.decode_audio().is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let dispatcher = Dispatcher::new(
            "http://127.0.0.1:3000/".to_string(),
            "alice".to_string(),
            "default".to_string(),
        );
        assert_eq!(dispatcher.base_url, "http://127.0.0.1:3000");
    }
}
