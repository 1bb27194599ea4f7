//! HTTP API server for the relay

pub mod health;
pub mod memory;
pub mod prompts;
pub mod tts;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::db::{DbPool, HistoryRepo};
use crate::llm::ChatClient;
use crate::prompts::PromptRegistry;
use crate::voice::{SpeechToText, TextToSpeech};
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub history: HistoryRepo,
    pub prompts: PromptRegistry,
    /// Present only when credentials were configured; handlers answer
    /// 503 otherwise
    pub stt: Option<Arc<SpeechToText>>,
    pub tts: Option<Arc<TextToSpeech>>,
    pub chat: Option<Arc<ChatClient>>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    prompts: PromptRegistry,
    port: u16,
    stt: Option<Arc<SpeechToText>>,
    tts: Option<Arc<TextToSpeech>>,
    chat: Option<Arc<ChatClient>>,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(db: DbPool, prompts: PromptRegistry, port: u16) -> Self {
        Self {
            db,
            prompts,
            port,
            stt: None,
            tts: None,
            chat: None,
            static_dir: None,
        }
    }

    /// Set the STT client
    #[must_use]
    pub fn stt(mut self, stt: Arc<SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    /// Set the TTS client
    #[must_use]
    pub fn tts(mut self, tts: Arc<TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Set the chat client
    #[must_use]
    pub fn chat(mut self, chat: Arc<ChatClient>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            history: HistoryRepo::new(self.db),
            prompts: self.prompts,
            stt: self.stt,
            tts: self.tts,
            chat: self.chat,
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(voice::router(self.state.clone()))
            .merge(prompts::router(self.state.clone()))
            .merge(memory::router(self.state.clone()))
            .merge(tts::router(self.state.clone()))
            .merge(health::router());

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from the web client
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        tracing::info!(port = self.port, "relay API listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
