//! Configuration management for the murmur relay

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default Deepgram STT model
pub const DEFAULT_STT_MODEL: &str = "general";

/// Default Deepgram TTS voice model
pub const DEFAULT_TTS_MODEL: &str = "aura-asteria-en";

/// Relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, prompts)
    pub data_dir: PathBuf,

    /// Directory holding `.txt` system prompts
    pub prompts_dir: PathBuf,

    /// Voice session configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Chat model identifier
    pub chat_model: String,

    /// STT model identifier
    pub stt_model: String,

    /// TTS voice model identifier
    pub tts_model: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI), served as a fallback
    pub static_dir: Option<PathBuf>,
}

/// Voice session configuration: sampler tick, calibration window, and
/// hysteresis timings for the detector
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable the local voice session
    pub enabled: bool,

    /// Sampler tick interval
    pub tick_interval: Duration,

    /// Calibration window at session start
    pub calibration_window: Duration,

    /// Absolute lower bound for the detection threshold
    pub rms_floor: f32,

    /// Multiplier applied to the calibrated ambient RMS
    pub ambient_multiplier: f32,

    /// Sustained speech required to open an utterance
    pub min_speech: Duration,

    /// Sustained silence required to close an utterance
    pub end_silence: Duration,

    /// Relay endpoint the session posts utterances to; defaults to the
    /// local server
    pub relay_url: Option<String>,

    /// User identifier sent with each utterance
    pub user_id: String,

    /// Prompt name sent with each utterance
    pub prompt_name: String,

    /// Greeting spoken when the session starts
    pub greeting: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval: Duration::from_millis(50),
            calibration_window: Duration::from_millis(1000),
            rms_floor: 0.02,
            ambient_multiplier: 3.0,
            min_speech: Duration::from_millis(250),
            end_silence: Duration::from_millis(800),
            relay_url: None,
            user_id: "anonymous".to_string(),
            prompt_name: "default".to_string(),
            greeting: "Hi, I am the voice assistant. How can I help you today?".to_string(),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat completions, alternative TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (STT and TTS)
    pub deepgram: Option<String>,
}

impl Config {
    /// Load configuration from the environment with the optional TOML
    /// file overlay. Env vars win over the file; the file wins over
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a required API key is missing --
    /// the process must not start without credentials.
    pub fn load(disable_voice: bool) -> Result<Self> {
        let overlay = file::load_config_file();

        let openai = env_or(overlay.api_keys.openai, "OPENAI_API_KEY");
        let deepgram = env_or(overlay.api_keys.deepgram, "DEEPGRAM_API_KEY");

        if openai.is_none() {
            return Err(Error::Config("missing OPENAI_API_KEY".to_string()));
        }
        if deepgram.is_none() {
            return Err(Error::Config("missing DEEPGRAM_API_KEY".to_string()));
        }

        let data_dir = overlay
            .server
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let prompts_dir = overlay
            .server
            .prompts_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("prompts"));

        let mut voice = VoiceConfig {
            enabled: !disable_voice && overlay.voice.enabled.unwrap_or(true),
            ..VoiceConfig::default()
        };
        if let Some(ms) = overlay.voice.tick_interval_ms {
            voice.tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.voice.min_speech_ms {
            voice.min_speech = Duration::from_millis(ms);
        }
        if let Some(ms) = overlay.voice.end_silence_ms {
            voice.end_silence = Duration::from_millis(ms);
        }
        if let Some(floor) = overlay.voice.rms_floor {
            voice.rms_floor = floor;
        }
        if let Some(mult) = overlay.voice.ambient_multiplier {
            voice.ambient_multiplier = mult;
        }
        if let Some(user) = overlay.voice.user_id {
            voice.user_id = user;
        }
        if let Some(prompt) = overlay.voice.prompt_name {
            voice.prompt_name = prompt;
        }
        if let Some(greeting) = overlay.voice.greeting {
            voice.greeting = greeting;
        }
        // CLI flag / env override happens in main, after load
        voice.relay_url = overlay.voice.relay_url;

        Ok(Self {
            data_dir,
            prompts_dir,
            voice,
            api_keys: ApiKeys { openai, deepgram },
            server: ServerConfig {
                port: overlay.server.port.unwrap_or(3000),
                static_dir: overlay.server.static_dir.map(PathBuf::from),
            },
            chat_model: env_or(overlay.llm.chat_model, "OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            stt_model: env_or(overlay.llm.stt_model, "DEEPGRAM_STT_MODEL")
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts_model: env_or(overlay.llm.tts_model, "DEEPGRAM_TTS_MODEL")
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
        })
    }
}

/// Env var wins over the file overlay value
fn env_or(overlay: Option<String>, var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty()).or(overlay)
}

/// Default data directory: `~/.local/share/murmur/` (platform equivalent)
fn default_data_dir() -> PathBuf {
    let dir = directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/murmur"),
        |d| d.data_dir().join("murmur"),
    );

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to create data directory");
    }

    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_defaults_match_detection_timings() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.tick_interval, Duration::from_millis(50));
        assert_eq!(voice.min_speech, Duration::from_millis(250));
        assert_eq!(voice.end_silence, Duration::from_millis(800));
        assert!((voice.rms_floor - 0.02).abs() < f32::EPSILON);
        assert!((voice.ambient_multiplier - 3.0).abs() < f32::EPSILON);
    }
}
