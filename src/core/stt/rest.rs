//! Whisper-compatible REST transcription.
//!
//! Batch recognizer for any OpenAI-compatible `/audio/transcriptions`
//! endpoint. Buffered PCM is wrapped in a WAV container and uploaded as
//! multipart form data; the `verbose_json` response carries both the
//! transcript and the detected language tag.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{BatchRecognizer, BatchTranscript};
use crate::core::codec::le_bytes_to_samples;
use crate::errors::RecognizerError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WhisperRestConfig {
    /// Base URL up to and including the API version, e.g.
    /// `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl WhisperRestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct WhisperRestRecognizer {
    config: WhisperRestConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl WhisperRestRecognizer {
    pub fn new(config: WhisperRestConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url.trim_end_matches('/'))
    }

    /// Wrap raw 16-bit mono PCM in a WAV container.
    fn to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, RecognizerError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| RecognizerError::AudioEncoding(e.to_string()))?;
            for sample in le_bytes_to_samples(pcm) {
                writer
                    .write_sample(sample)
                    .map_err(|e| RecognizerError::AudioEncoding(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| RecognizerError::AudioEncoding(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl BatchRecognizer for WhisperRestRecognizer {
    async fn transcribe(
        &self,
        pcm: Bytes,
        sample_rate: u32,
    ) -> Result<BatchTranscript, RecognizerError> {
        let wav = Self::to_wav(&pcm, sample_rate)?;
        debug!(bytes = wav.len(), sample_rate, "uploading audio for transcription");

        let file_part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognizerError::AudioEncoding(e.to_string()))?;
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognizerError::Status { status, body });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| RecognizerError::InvalidResponse(e.to_string()))?;

        Ok(BatchTranscript {
            text: parsed.text,
            language_tag: parsed.language.unwrap_or_default(),
        })
    }
}
