//! Configuration loading: YAML file, environment overrides, defaults.
//!
//! Nothing global; the loaded config is passed explicitly into state and
//! session construction. API keys are taken from the environment when the
//! file omits them, so config files can be committed without secrets.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::core::language::{Locale, LockStrictness};
use crate::errors::ConfigError;

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_language() -> Locale {
    Locale::EnIn
}

fn default_chunk_threshold_ms() -> u64 {
    900
}

fn default_ignore_margin_ms() -> u64 {
    350
}

fn default_frame_interval_ms() -> u64 {
    20
}

fn default_reply_max_chars() -> usize {
    240
}

/// Bridge behavior knobs; all have workable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_language")]
    pub default_language: Locale,
    #[serde(default)]
    pub lock_strictness: LockStrictness,
    /// Batch-path chunk boundary.
    #[serde(default = "default_chunk_threshold_ms")]
    pub chunk_threshold_ms: u64,
    /// Safety margin added to the echo-suppression window.
    #[serde(default = "default_ignore_margin_ms")]
    pub ignore_margin_ms: u64,
    /// Telephony frame cadence for paced playback.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_reply_max_chars")]
    pub reply_max_chars: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            lock_strictness: LockStrictness::default(),
            chunk_threshold_ms: default_chunk_threshold_ms(),
            ignore_margin_ms: default_ignore_margin_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            reply_max_chars: default_reply_max_chars(),
        }
    }
}

impl BridgeConfig {
    pub fn chunk_threshold(&self) -> Duration {
        Duration::from_millis(self.chunk_threshold_ms)
    }

    pub fn ignore_margin(&self) -> Duration {
        Duration::from_millis(self.ignore_margin_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// One OpenAI-compatible provider endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
}

/// Synthesis additionally needs a voice.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL of this process; hosted fallback clips
    /// are served under it. Defaults to `http://{host}:{port}`.
    #[serde(default)]
    pub public_url: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub stt: ProviderConfig,
    pub llm: ProviderConfig,
    pub tts: TtsConfig,
}

impl ServerConfig {
    /// Load from a YAML file, then apply environment overrides and
    /// validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ServerConfig = serde_yaml::from_str(&raw)?;
        config.apply_env();
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Environment wins over the file for secrets and deployment-specific
    /// values.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("STT_API_KEY") {
            self.stt.api_key = key;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(key) = std::env::var("TTS_API_KEY") {
            self.tts.api_key = key;
        }
        if let Ok(url) = std::env::var("PUBLIC_URL") {
            self.public_url = url;
        }
        if self.public_url.is_empty() {
            self.public_url = format!("http://{}:{}", self.host, self.port);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("public_url", &self.public_url),
            ("stt.base_url", &self.stt.base_url),
            ("llm.base_url", &self.llm.base_url),
            ("tts.base_url", &self.tts.base_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} is not a valid URL: {e}")))?;
        }
        if self.bridge.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("frame_interval_ms must be nonzero".into()));
        }
        if self.bridge.chunk_threshold_ms == 0 {
            return Err(ConfigError::Invalid("chunk_threshold_ms must be nonzero".into()));
        }
        if self.bridge.reply_max_chars == 0 {
            return Err(ConfigError::Invalid("reply_max_chars must be nonzero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
stt:
  base_url: "https://api.groq.com/openai/v1"
  model: "whisper-large-v3"
llm:
  base_url: "https://api.openai.com/v1"
  model: "gpt-4o-mini"
tts:
  base_url: "https://api.openai.com/v1"
  model: "tts-1"
  voice: "alloy"
"#;

    fn parse(yaml: &str) -> ServerConfig {
        let mut config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        if config.public_url.is_empty() {
            config.public_url = format!("http://{}:{}", config.host, config.port);
        }
        config
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.bridge.default_language, Locale::EnIn);
        assert_eq!(config.bridge.lock_strictness, LockStrictness::Loose);
        assert_eq!(config.bridge.chunk_threshold(), Duration::from_millis(900));
        assert_eq!(config.bridge.ignore_margin(), Duration::from_millis(350));
        assert_eq!(config.bridge.frame_interval(), Duration::from_millis(20));
        config.validate().unwrap();
    }

    #[test]
    fn bridge_section_overrides_defaults() {
        let yaml = format!(
            "{MINIMAL}\nbridge:\n  default_language: \"hi-IN\"\n  lock_strictness: strict\n  chunk_threshold_ms: 600\n"
        );
        let config = parse(&yaml);
        assert_eq!(config.bridge.default_language, Locale::HiIn);
        assert_eq!(config.bridge.lock_strictness, LockStrictness::Strict);
        assert_eq!(config.bridge.chunk_threshold(), Duration::from_millis(600));
    }

    #[test]
    fn invalid_urls_are_rejected() {
        let mut config = parse(MINIMAL);
        config.stt.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_frame_interval_is_rejected() {
        let mut config = parse(MINIMAL);
        config.bridge.frame_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
