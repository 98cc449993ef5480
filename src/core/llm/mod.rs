//! Reply text generation.
//!
//! The generator contract is one turn in, one short reply out. Replies are
//! spoken over a phone line, so the client steers any OpenAI-compatible
//! chat-completions endpoint toward a single short sentence in the
//! resolved language of the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::core::language::Locale;
use crate::errors::GenerationError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
const DEFAULT_MAX_TOKENS: u32 = 120;

/// Produces the assistant's reply text for one caller turn.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, transcript: &str, language: Locale) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct ChatGeneratorConfig {
    /// Base URL up to and including the API version, e.g.
    /// `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl ChatGeneratorConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct ChatGenerator {
    config: ChatGeneratorConfig,
    http: Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatGenerator {
    pub fn new(config: ChatGeneratorConfig, http: Client) -> Self {
        Self { config, http }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn system_prompt(language: Locale) -> String {
        format!(
            "You are a helpful assistant speaking with a caller on a phone line. \
             Reply with a single short sentence in {}. Do not use lists, \
             markdown, or emoji.",
            language.language_name()
        )
    }
}

#[async_trait]
impl TextGenerator for ChatGenerator {
    async fn generate(&self, transcript: &str, language: Locale) -> Result<String, GenerationError> {
        let system = Self::system_prompt(language);
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                ChatMessage { role: "system", content: &system },
                ChatMessage { role: "user", content: transcript },
            ],
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
            return Err(GenerationError::Status { status, body });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default();
        if reply.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }
        debug!(language = %language, chars = reply.len(), "reply generated");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(base_url: &str) -> ChatGenerator {
        ChatGenerator::new(
            ChatGeneratorConfig::new(base_url, "test-key", "test-model"),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "  I am fine, thank you.  " } }
                ]
            })))
            .mount(&server)
            .await;

        let out = generator(&format!("{}/v1", server.uri()))
            .generate("how are you", Locale::EnIn)
            .await
            .unwrap();
        assert_eq!(out, "I am fine, thank you.");
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "role": "assistant", "content": "" } } ]
            })))
            .mount(&server)
            .await;

        let err = generator(&format!("{}/v1", server.uri()))
            .generate("hello", Locale::HiIn)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyOutput));
    }

    #[tokio::test]
    async fn server_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = generator(&format!("{}/v1", server.uri()))
            .generate("hello", Locale::EnIn)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Status { status, .. } if status.as_u16() == 500));
    }

    #[test]
    fn system_prompt_names_the_language() {
        assert!(ChatGenerator::system_prompt(Locale::TaIn).contains("Tamil"));
        assert!(ChatGenerator::system_prompt(Locale::EnIn).contains("English"));
    }
}
