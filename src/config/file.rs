//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` as a persistent config source.
//! All fields are optional -- the file is a partial overlay on top of
//! defaults, and env vars override both.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// Model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice session configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Model-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Chat model identifier (e.g. "gpt-4o-mini")
    pub chat_model: Option<String>,

    /// STT model identifier (e.g. "general", "nova-2")
    pub stt_model: Option<String>,

    /// TTS voice model identifier (e.g. "aura-asteria-en")
    pub tts_model: Option<String>,
}

/// Voice session configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable the local voice session
    pub enabled: Option<bool>,

    /// Sampler tick interval in milliseconds
    pub tick_interval_ms: Option<u64>,

    /// Sustained speech (ms) required to open an utterance
    pub min_speech_ms: Option<u64>,

    /// Sustained silence (ms) required to close an utterance
    pub end_silence_ms: Option<u64>,

    /// Absolute lower bound for the detection threshold
    pub rms_floor: Option<f32>,

    /// Multiplier applied to the calibrated ambient RMS
    pub ambient_multiplier: Option<f32>,

    /// Relay endpoint override
    pub relay_url: Option<String>,

    /// User identifier sent with utterances
    pub user_id: Option<String>,

    /// Prompt name sent with utterances
    pub prompt_name: Option<String>,

    /// Session-start greeting text
    pub greeting: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP server port
    pub port: Option<u16>,

    /// Data directory override
    pub data_dir: Option<String>,

    /// Prompts directory override
    pub prompts_dir: Option<String>,

    /// Static files directory (web UI)
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or
/// can't be parsed.
pub fn load_config_file() -> RelayConfigFile {
    let Some(path) = config_file_path() else {
        return RelayConfigFile::default();
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            // A missing file is the common case and not worth a warning
            if path.exists() {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
            }
            return RelayConfigFile::default();
        }
    };

    match toml::from_str(&content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config overlay");
            config
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config file ignored: parse error");
            RelayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml"))
}
