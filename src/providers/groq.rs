//! Groq adapter — fast inference behind an OpenAI-compatible API.
//!
//! Auth is a bearer token; text and vision both go through
//! `POST {base}/chat/completions`.  Vision attaches the page image as an
//! OpenAI-style base64 data-URL part.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::{ProviderConfig, ProviderName};

use super::error::{classify_status, parse_retry_after, ProviderError};
use super::message::ChatMessage;
use super::{
    openai_compat, retry, sniff_image_mime, Completion, CompletionOptions, Provider,
    VisionProvider, DEFAULT_TEMPERATURE,
};

/// Output-token ceiling for Groq-hosted models.
const MAX_OUTPUT_TOKENS: u32 = 8_192;

// ---------------------------------------------------------------------------
// GroqProvider
// ---------------------------------------------------------------------------

/// Adapter for the Groq cloud API.
pub struct GroqProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GroqProvider {
    /// Build the adapter from a resolved config.
    ///
    /// The HTTP client carries the per-call timeout and its own connection
    /// pool to the Groq host.  A default client is the last-resort fallback
    /// if the builder fails (should never happen in practice).
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// One request/response round-trip, classified into the taxonomy.
    async fn post_chat(&self, body: &serde_json::Value) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &text, retry_after));
        }
        openai_compat::parse_chat_response(&text, &self.config.model)
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Groq
    }

    async fn complete_text(
        &self,
        messages: &[ChatMessage],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let model = opts.model.as_deref().unwrap_or(&self.config.model);
        let temperature = opts.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = opts.max_tokens.map(|t| t.min(MAX_OUTPUT_TOKENS));

        log::debug!("groq: chat completion with model {model}");
        let body = openai_compat::chat_request_body(model, messages, temperature, max_tokens);

        retry::with_retries("groq", self.config.max_retries, || self.post_chat(&body)).await
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let messages = [ChatMessage::user("ping")];
        let body =
            openai_compat::chat_request_body(&self.config.model, &messages, DEFAULT_TEMPERATURE, Some(5));
        self.post_chat(&body).await.map(|_| ())
    }

    fn as_vision(&self) -> Option<&dyn VisionProvider> {
        self.config
            .vision_model
            .is_some()
            .then_some(self as &dyn VisionProvider)
    }
}

#[async_trait]
impl VisionProvider for GroqProvider {
    async fn complete_vision(
        &self,
        prompt: &str,
        image: &[u8],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let model = opts
            .model
            .as_deref()
            .or(self.config.vision_model.as_deref())
            .ok_or_else(|| ProviderError::Fatal("groq vision model not configured".into()))?;

        log::debug!("groq: vision completion with model {model}");
        let body = openai_compat::vision_request_body(
            model,
            prompt,
            sniff_image_mime(image),
            &BASE64.encode(image),
        );

        retry::with_retries("groq", self.config.max_retries, || self.post_chat(&body)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
