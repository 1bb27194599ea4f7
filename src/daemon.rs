//! Daemon - the main relay service
//!
//! Hosts the HTTP pipeline and, when voice is enabled, runs the local
//! voice session against it.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::ApiServerBuilder;
use crate::db::{self, DbPool};
use crate::llm::ChatClient;
use crate::prompts::PromptRegistry;
use crate::voice::{SpeechToText, TextToSpeech, VoiceSession};
use crate::{Config, Result};

/// The murmur daemon - relay server plus optional voice session
pub struct Daemon {
    config: Config,
    db: DbPool,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails
    #[allow(clippy::unused_async)]
    pub async fn new(config: Config) -> Result<Self> {
        let db_path = config.data_dir.join("murmur.db");
        let db = db::init(&db_path)?;

        tracing::info!(path = %db_path.display(), "database initialized");

        Ok(Self { config, db })
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let prompts = PromptRegistry::new(&self.config.prompts_dir)?;

        // Credentials are validated at config load; these only fail on
        // empty strings
        let deepgram_key = self.config.api_keys.deepgram.clone().unwrap_or_default();
        let openai_key = self.config.api_keys.openai.clone().unwrap_or_default();

        let stt = Arc::new(SpeechToText::new_deepgram(
            deepgram_key.clone(),
            self.config.stt_model.clone(),
        )?);
        let tts = Arc::new(TextToSpeech::new_deepgram(
            deepgram_key,
            self.config.tts_model.clone(),
        )?);
        let chat = Arc::new(ChatClient::new(
            openai_key,
            self.config.chat_model.clone(),
        )?);

        let port = self.config.server.port;
        let server = ApiServerBuilder::new(self.db.clone(), prompts, port)
            .stt(stt)
            .tts(tts)
            .chat(chat)
            .static_dir(self.config.server.static_dir.clone())
            .build();
        let server_handle = server.spawn();

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        // Run the voice session on the main task (cpal streams aren't Send)
        if self.config.voice.enabled {
            let relay_url = self
                .config
                .voice
                .relay_url
                .clone()
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

            match VoiceSession::new(self.config.voice.clone(), relay_url) {
                Ok(session) => {
                    session.run(&mut shutdown_rx).await?;
                }
                Err(e) => {
                    // Capability/device errors stop the session from
                    // starting, not the relay server
                    tracing::error!(error = %e, "voice session unavailable, serving relay only");
                    let _ = shutdown_rx.recv().await;
                }
            }
        } else {
            tracing::info!("voice disabled - running relay only");
            let _ = shutdown_rx.recv().await;
        }

        server_handle.abort();
        Ok(())
    }
}
