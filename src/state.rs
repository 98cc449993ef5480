//! Shared application state.
//!
//! Built once at startup from the loaded configuration and passed into the
//! router. Collaborator clients are constructed here and shared across
//! sessions; per-call state lives entirely inside each session's runner.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;

use crate::config::ServerConfig;
use crate::core::language::Locale;
use crate::core::llm::{ChatGenerator, ChatGeneratorConfig};
use crate::core::playback::ClipStore;
use crate::core::reply::ReplyPipeline;
use crate::core::session::{SessionConfig, SessionDeps};
use crate::core::stt::{
    BatchRecognizer, StreamingRecognizerFactory, WhisperRestConfig, WhisperRestRecognizer,
};
use crate::core::transport::CallTransport;
use crate::core::tts::{SpeechRestConfig, SpeechRestSynthesizer};

pub struct AppState {
    pub config: ServerConfig,
    pub clips: Arc<ClipStore>,
    pub batch: Arc<dyn BatchRecognizer>,
    /// Present when a streaming recognition provider is configured; sessions
    /// fall back to the batch path when absent or when connect fails.
    pub streaming_factory: Option<Arc<dyn StreamingRecognizerFactory>>,
    pub pipeline: Arc<ReplyPipeline>,
    /// Live call ids, for the health surface.
    pub active_calls: DashMap<String, ()>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        // One pooled HTTP client for every collaborator.
        let http = Client::new();

        let batch: Arc<dyn BatchRecognizer> = Arc::new(WhisperRestRecognizer::new(
            WhisperRestConfig::new(
                config.stt.base_url.clone(),
                config.stt.api_key.clone(),
                config.stt.model.clone(),
            ),
            http.clone(),
        ));

        let generator = Arc::new(ChatGenerator::new(
            ChatGeneratorConfig::new(
                config.llm.base_url.clone(),
                config.llm.api_key.clone(),
                config.llm.model.clone(),
            ),
            http.clone(),
        ));

        let synthesizer = Arc::new(SpeechRestSynthesizer::new(
            SpeechRestConfig::new(
                config.tts.base_url.clone(),
                config.tts.api_key.clone(),
                config.tts.model.clone(),
                config.tts.voice.clone(),
            ),
            http,
        ));

        let pipeline = Arc::new(ReplyPipeline::new(
            generator,
            synthesizer,
            config.bridge.reply_max_chars,
        ));
        let clips = Arc::new(ClipStore::new(config.public_url.clone()));

        Self {
            config,
            clips,
            batch,
            streaming_factory: None,
            pipeline,
            active_calls: DashMap::new(),
        }
    }

    /// Session parameters for one accepted call.
    pub fn session_config(&self, call_id: String, sample_rate: u32, channel_count: u16) -> SessionConfig {
        SessionConfig {
            call_id,
            sample_rate,
            channel_count,
            default_language: self.config.bridge.default_language,
            lock_strictness: self.config.bridge.lock_strictness,
            chunk_threshold: self.config.bridge.chunk_threshold(),
            ignore_margin: self.config.bridge.ignore_margin(),
        }
    }

    pub fn session_deps(&self, transport: Arc<dyn CallTransport>) -> SessionDeps {
        SessionDeps {
            transport,
            streaming_factory: self.streaming_factory.clone(),
            batch: Arc::clone(&self.batch),
            pipeline: Arc::clone(&self.pipeline),
            clips: Arc::clone(&self.clips),
            frame_interval: self.config.bridge.frame_interval(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.config.bridge.frame_interval()
    }

    pub fn default_language(&self) -> Locale {
        self.config.bridge.default_language
    }
}
