//! Core `ReplyGenerator` trait and `ApiGenerator` implementation.
//!
//! `ApiGenerator` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! — OpenAI, Groq, Ollama (OpenAI mode), LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::prompt::{ChatTurn, PromptBuilder};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while generating a reply.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("text generation timed out")]
    Timeout,

    /// The service answered with a non-2xx status.
    #[error("text generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse generation response: {0}")]
    Parse(String),

    /// The response had no usable text content.
    #[error("text generation returned an empty reply")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ReplyGenerator trait
// ---------------------------------------------------------------------------

/// Async trait for producing the companion's reply to an utterance.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ReplyGenerator>`.
///
/// # Arguments
/// * `text`    – The user's final transcript.
/// * `history` – Recent turns of the current conversation, oldest first.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, text: &str, history: &[ChatTurn]) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiGenerator
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint, one attempt
/// per utterance.
pub struct ApiGenerator {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
    prompt_builder: PromptBuilder,
}

impl ApiGenerator {
    /// Build an `ApiGenerator` from application config.
    ///
    /// The API key is resolved once here (environment first, then the saved
    /// value).  The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.resolve_api_key(),
            config: config.clone(),
            prompt_builder: PromptBuilder::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, text: &str, history: &[ChatTurn]) -> serde_json::Value {
        serde_json::json!({
            "model":       self.config.model,
            "messages":    self.prompt_builder.build(text, history),
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_reply(json: &serde_json::Value) -> Result<String, LlmError> {
    let reply = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if reply.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(reply)
}

#[async_trait]
impl ReplyGenerator for ApiGenerator {
    /// The `Authorization: Bearer …` header is attached only when a key
    /// resolved.
    async fn generate(&self, text: &str, history: &[ChatTurn]) -> Result<String, LlmError> {
        let mut req = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(text, history));

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let reply = extract_reply(&json)?;
        log::debug!("llm: reply of {} chars", reply.len());
        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: base_url.into(),
            api_key: None,
            api_key_env: "VOICE_COMPANION_TEST_LLM_KEY_UNSET".into(),
            timeout_secs: 2,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let g = ApiGenerator::from_config(&make_config("http://localhost:11434/"));
        assert_eq!(g.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_body_embeds_system_prompt_and_user_text() {
        let g = ApiGenerator::from_config(&make_config("http://localhost"));
        let body = g.request_body("hello", &[ChatTurn::assistant("Welcome back.")]);

        assert_eq!(body["model"], LlmConfig::default().model);
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Welcome back.");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "hello");
    }

    #[test]
    fn extract_reply_trims_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Peace be with you.\n" } }]
        });
        assert_eq!(extract_reply(&json).unwrap(), "Peace be with you.");
    }

    #[test]
    fn extract_reply_rejects_missing_or_blank_content() {
        let missing = serde_json::json!({ "choices": [] });
        assert!(matches!(extract_reply(&missing), Err(LlmError::EmptyResponse)));

        let blank = serde_json::json!({
            "choices": [{ "message": { "content": "   " } }]
        });
        assert!(matches!(extract_reply(&blank), Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let g = ApiGenerator::from_config(&make_config("http://127.0.0.1:9"));
        let result = g.generate("hello", &[]).await;
        assert!(matches!(
            result,
            Err(LlmError::Request(_)) | Err(LlmError::Timeout)
        ));
    }

    #[test]
    fn generator_is_object_safe() {
        let g: Box<dyn ReplyGenerator> =
            Box::new(ApiGenerator::from_config(&make_config("http://localhost")));
        drop(g);
    }
}
