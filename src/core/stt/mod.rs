//! Speech recognition collaborators.
//!
//! Two contracts cover the two transcription routes: a streaming recognizer
//! that pushes voice-activity and transcript events over a channel, and a
//! batch recognizer that transcribes a bounded buffer per request. The
//! route is selected once per session; a failed streaming connect (or a
//! mid-stream error) downgrades the session to batch for its remainder.

mod rest;

pub use rest::{WhisperRestConfig, WhisperRestRecognizer};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::RecognizerError;

/// Events pushed by a streaming recognizer connection.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    SpeechStarted,
    SpeechEnded,
    PartialTranscript { text: String, language_tag: String },
    FinalTranscript { text: String, language_tag: String },
    /// The stream broke; the session downgrades to batch transcription.
    StreamError { message: String },
}

/// One live streaming-recognition connection. Audio in, events out via the
/// channel handed to the factory at connect time.
#[async_trait]
pub trait StreamingRecognizer: Send + Sync {
    /// Forward raw 16-bit little-endian mono PCM.
    async fn send_audio(&self, pcm: Bytes) -> Result<(), RecognizerError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// Opens streaming-recognition connections.
#[async_trait]
pub trait StreamingRecognizerFactory: Send + Sync {
    async fn connect(
        &self,
        sample_rate: u32,
        events: mpsc::Sender<RecognizerEvent>,
    ) -> Result<Box<dyn StreamingRecognizer>, RecognizerError>;
}

/// Transcript of one batch request.
#[derive(Debug, Clone)]
pub struct BatchTranscript {
    pub text: String,
    /// Recognizer-reported language tag, unnormalized. Empty when the
    /// provider omits it.
    pub language_tag: String,
}

/// Request/response transcription over a bounded audio buffer.
#[async_trait]
pub trait BatchRecognizer: Send + Sync {
    async fn transcribe(
        &self,
        pcm: Bytes,
        sample_rate: u32,
    ) -> Result<BatchTranscript, RecognizerError>;
}

/// The transcription route a session settled on.
pub enum RecognizerRoute {
    Streaming(Box<dyn StreamingRecognizer>),
    Batch(Arc<dyn BatchRecognizer>),
}

impl RecognizerRoute {
    pub fn is_streaming(&self) -> bool {
        matches!(self, RecognizerRoute::Streaming(_))
    }
}

/// Pick the transcription route for a new session. Streaming is preferred
/// when a factory is configured and the connect succeeds; anything else
/// lands on batch.
pub async fn select_route(
    streaming: Option<&Arc<dyn StreamingRecognizerFactory>>,
    batch: &Arc<dyn BatchRecognizer>,
    sample_rate: u32,
    events: mpsc::Sender<RecognizerEvent>,
) -> RecognizerRoute {
    if let Some(factory) = streaming {
        match factory.connect(sample_rate, events).await {
            Ok(conn) => {
                info!(sample_rate, "streaming recognizer connected");
                return RecognizerRoute::Streaming(conn);
            }
            Err(e) => {
                warn!(error = %e, "streaming recognizer connect failed, using batch");
            }
        }
    }
    RecognizerRoute::Batch(Arc::clone(batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullBatch;

    #[async_trait]
    impl BatchRecognizer for NullBatch {
        async fn transcribe(
            &self,
            _pcm: Bytes,
            _sample_rate: u32,
        ) -> Result<BatchTranscript, RecognizerError> {
            Ok(BatchTranscript {
                text: String::new(),
                language_tag: String::new(),
            })
        }
    }

    struct FailingFactory;

    #[async_trait]
    impl StreamingRecognizerFactory for FailingFactory {
        async fn connect(
            &self,
            _sample_rate: u32,
            _events: mpsc::Sender<RecognizerEvent>,
        ) -> Result<Box<dyn StreamingRecognizer>, RecognizerError> {
            Err(RecognizerError::ConnectFailed("refused".into()))
        }
    }

    #[tokio::test]
    async fn failed_streaming_connect_falls_back_to_batch() {
        let factory: Arc<dyn StreamingRecognizerFactory> = Arc::new(FailingFactory);
        let batch: Arc<dyn BatchRecognizer> = Arc::new(NullBatch);
        let (tx, _rx) = mpsc::channel(8);

        let route = select_route(Some(&factory), &batch, 16_000, tx).await;
        assert!(!route.is_streaming());
    }

    #[tokio::test]
    async fn no_factory_means_batch() {
        let batch: Arc<dyn BatchRecognizer> = Arc::new(NullBatch);
        let (tx, _rx) = mpsc::channel(8);

        let route = select_route(None, &batch, 16_000, tx).await;
        assert!(!route.is_streaming());
    }
}
