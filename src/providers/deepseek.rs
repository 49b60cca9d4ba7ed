//! DeepSeek adapter — OpenAI-compatible API with a code-specialised model.
//!
//! Text-only: DeepSeek has no vision endpoint, so this adapter never
//! implements [`VisionProvider`] and vision requests cannot be routed here.
//! When the document-type hint says the text is code, the adapter swaps the
//! general chat model for the configured coder model.

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderName};
use crate::enhance::DocumentType;

use super::error::{classify_status, parse_retry_after, ProviderError};
use super::message::ChatMessage;
use super::{openai_compat, retry, Completion, CompletionOptions, Provider, DEFAULT_TEMPERATURE};

/// Output-token ceiling for DeepSeek models.
const MAX_OUTPUT_TOKENS: u32 = 8_192;

// ---------------------------------------------------------------------------
// DeepseekProvider
// ---------------------------------------------------------------------------

/// Adapter for the DeepSeek cloud API.
pub struct DeepseekProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl DeepseekProvider {
    /// Build the adapter from a resolved config.
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    /// Pick the model for a call: explicit override, else the coder model
    /// for code documents, else the general chat model.
    fn select_model<'a>(&'a self, opts: &'a CompletionOptions) -> &'a str {
        if let Some(model) = opts.model.as_deref() {
            return model;
        }
        if opts.document_type == DocumentType::Code {
            if let Some(coder) = self.config.coder_model.as_deref() {
                return coder;
            }
        }
        &self.config.model
    }

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
impl Provider for DeepseekProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Deepseek
    }

    async fn complete_text(
        &self,
        messages: &[ChatMessage],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let model = self.select_model(opts);
        let temperature = opts.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = opts.max_tokens.map(|t| t.min(MAX_OUTPUT_TOKENS));

        log::debug!("deepseek: chat completion with model {model}");
        let body = openai_compat::chat_request_body(model, messages, temperature, max_tokens);

        retry::with_retries("deepseek", self.config.max_retries, || self.post_chat(&body)).await
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let messages = [ChatMessage::user("ping")];
        let body =
            openai_compat::chat_request_body(&self.config.model, &messages, DEFAULT_TEMPERATURE, Some(5));
        self.post_chat(&body).await.map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
