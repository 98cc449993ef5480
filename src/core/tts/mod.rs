//! Speech synthesis collaborators.
//!
//! The synthesizer contract returns decoded linear PCM rather than a
//! container: the playback pacer needs samples it can resample and compand
//! frame by frame. The REST client targets any OpenAI-compatible
//! `/audio/speech` endpoint and asks for a WAV response, decoding it on
//! receipt.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::core::language::Locale;
use crate::errors::SynthesisError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Decoded mono PCM ready for pacing.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> Duration {
        let micros = (self.samples.len() as u64).saturating_mul(1_000_000)
            / u64::from(self.sample_rate.max(1));
        Duration::from_micros(micros)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Converts reply text to audio in the caller's language.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: Locale) -> Result<AudioData, SynthesisError>;
}

#[derive(Debug, Clone)]
pub struct SpeechRestConfig {
    /// Base URL up to and including the API version, e.g.
    /// `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl SpeechRestConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct SpeechRestSynthesizer {
    config: SpeechRestConfig,
    http: Client,
}

impl SpeechRestSynthesizer {
    pub fn new(config: SpeechRestConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    /// Decode a WAV payload to mono PCM, averaging channels when the
    /// provider returns more than one.
    fn decode_wav(bytes: &[u8]) -> Result<AudioData, SynthesisError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| SynthesisError::Decode(e.to_string()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(SynthesisError::Decode(format!(
                "unsupported sample format: {:?} {}-bit",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let channels = usize::from(spec.channels.max(1));
        let mut samples = Vec::with_capacity(reader.len() as usize / channels);
        let mut frame = Vec::with_capacity(channels);
        for sample in reader.samples::<i16>() {
            let sample = sample.map_err(|e| SynthesisError::Decode(e.to_string()))?;
            frame.push(i32::from(sample));
            if frame.len() == channels {
                let sum: i32 = frame.iter().sum();
                samples.push((sum / channels as i32) as i16);
                frame.clear();
            }
        }

        Ok(AudioData {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechRestSynthesizer {
    async fn synthesize(&self, text: &str, language: Locale) -> Result<AudioData, SynthesisError> {
        let body = json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "input": text,
            "response_format": "wav",
            "language": language.code(),
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let audio = Self::decode_wav(&bytes)?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        debug!(
            samples = audio.samples.len(),
            sample_rate = audio.sample_rate,
            "speech synthesized"
        );
        Ok(audio)
    }
}
