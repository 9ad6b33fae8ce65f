//! Destination extraction — chat-completion client
//!
//! Wraps an instruction-following completion call that pulls a place name
//! out of a free-text utterance. The completion is constrained to answer
//! with the name alone; whatever comes back is passed downstream
//! unvalidated, and the location resolver gets to reject it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::LlmConfig;

const SYSTEM_INSTRUCTION: &str = "أجب بالاسم فقط.";

// ============================================================================
// PlaceExtractor trait
// ============================================================================

/// Abstraction over free-text place-name extraction.
#[async_trait]
pub trait PlaceExtractor: Send + Sync {
    /// Extract the destination name carried by an utterance.
    async fn extract_place_name(&self, utterance: &str) -> Result<String, ExtractError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Completion contained no text")]
    EmptyCompletion,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config types
// ============================================================================

/// Chat-completion client configuration
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl ExtractorConfig {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            timeout_seconds: 15,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }

    /// Build from the `[llm]` section, key from `OPENAI_API_KEY`.
    pub fn from_llm_config(llm: &LlmConfig) -> Self {
        let mut config = Self::new(None, llm.model.clone());
        config.timeout_seconds = llm.timeout_seconds;
        config.max_retries = llm.max_retries;
        config.retry_delay_ms = llm.retry_delay_ms;
        config
    }
}

// ============================================================================
// Chat-completion API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ============================================================================
// OpenAiExtractor
// ============================================================================

/// Extractor backed by the OpenAI chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiExtractor {
    client: Client,
    config: ExtractorConfig,
    base_url: String,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractError> {
        Self::with_base_url(config, "https://api.openai.com/v1".to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: ExtractorConfig, base_url: String) -> Result<Self, ExtractError> {
        if config.api_key.is_empty() {
            return Err(ExtractError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, ExtractError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.complete_once(&prompt)).await;

        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All extraction retry attempts failed"
                );
                Err(ExtractError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, ExtractError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");
            return Err(ExtractError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let completion: ChatResponse = response.json().await?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ExtractError::EmptyCompletion)?;

        Ok(text)
    }
}

#[async_trait]
impl PlaceExtractor for OpenAiExtractor {
    async fn extract_place_name(&self, utterance: &str) -> Result<String, ExtractError> {
        let prompt = format!(
            "استخرج اسم الوجهة من الرسالة التالية بدون أي كلمات إضافية:\n\"{}\"",
            utterance
        );
        let name = self.complete(prompt).await?;
        tracing::debug!(utterance, extracted = %name, "destination extracted");
        Ok(name)
    }

    fn name(&self) -> &str {
        "openai-chat"
    }
}

// ============================================================================
// TESTS
// ============================================================================
