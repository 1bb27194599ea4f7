//! Murmur Relay - voice-chat relay with on-device utterance detection
//!
//! This library provides the core functionality for the relay:
//! - Calibrated energy VAD and per-utterance recording
//! - Dispatch of finalized utterances through the STT/LLM/TTS pipeline
//! - Bounded per-user conversation history
//! - The HTTP relay server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Voice Session                       │
//! │  Sampler │ Calibrator │ VAD │ Recorder │ Playback   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ one clip per utterance
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Relay Server                        │
//! │   /api/voice │ /api/prompts │ /api/memory │ /api/tts │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              External Services                       │
//! │   Deepgram STT/TTS  │  OpenAI chat completions      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbPool, HistoryRepo};
pub use error::{Error, Result};
pub use prompts::PromptRegistry;
