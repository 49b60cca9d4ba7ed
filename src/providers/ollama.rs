//! Ollama adapter — locally hosted models behind the Ollama chat endpoint.
//!
//! No credential: the base URL is host-provided (default
//! `http://localhost:11434/api`).  Requests go to `POST {base}/chat` with
//! `stream: false`; generation knobs live under `options`.  Vision requests
//! embed base64 image bytes in an `images` array on the user message.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::{ProviderConfig, ProviderName};

use super::error::{classify_status, parse_retry_after, ProviderError};
use super::message::ChatMessage;
use super::{retry, Completion, CompletionOptions, Provider, VisionProvider, DEFAULT_TEMPERATURE};

/// Output-token ceiling for local models (`num_predict`).
const MAX_OUTPUT_TOKENS: u32 = 4_096;

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

/// Build an Ollama `/chat` request body.
fn chat_request_body(
    model: &str,
    messages: &[ChatMessage],
    temperature: f32,
    max_tokens: Option<u32>,
) -> Value {
    let mut options = json!({"temperature": temperature});
    if let Some(max) = max_tokens {
        options["num_predict"] = json!(max.min(MAX_OUTPUT_TOKENS));
    }
    json!({
        "model": model,
        "messages": messages,
        "stream": false,
        "options": options,
    })
}

/// Parse a 2xx `/chat` body.
fn parse_chat_response(body: &str, model: &str) -> Result<Completion, ProviderError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::BadResponse(format!("unparseable ollama body: {e}")))?;

    let text = data["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::BadResponse("ollama response missing content".into()))?
        .to_string();

    if text.trim().is_empty() {
        return Err(ProviderError::BadResponse("empty text content".into()));
    }

    Ok(Completion {
        text,
        model: data["model"].as_str().unwrap_or(model).to_string(),
        tokens_in: data["prompt_eval_count"].as_u64().map(|t| t as u32),
        tokens_out: data["eval_count"].as_u64().map(|t| t as u32),
    })
}

// ---------------------------------------------------------------------------
// OllamaProvider
// ---------------------------------------------------------------------------

/// Adapter for a local Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OllamaProvider {
    /// Build the adapter from a resolved config.
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    async fn post_chat(&self, body: &Value) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat", self.config.base_url);

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &text, retry_after));
        }
        parse_chat_response(&text, &self.config.model)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Ollama
    }

    async fn complete_text(
        &self,
        messages: &[ChatMessage],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let model = opts.model.as_deref().unwrap_or(&self.config.model);
        let temperature = opts.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        log::debug!("ollama: chat completion with model {model}");
        let body = chat_request_body(model, messages, temperature, opts.max_tokens);

        retry::with_retries("ollama", self.config.max_retries, || self.post_chat(&body)).await
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let messages = [ChatMessage::user("ping")];
        let body = chat_request_body(&self.config.model, &messages, DEFAULT_TEMPERATURE, Some(5));
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
impl VisionProvider for OllamaProvider {
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
            .ok_or_else(|| ProviderError::Fatal("ollama vision model not configured".into()))?;

        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [BASE64.encode(image)],
            }],
            "stream": false,
            "options": {"temperature": DEFAULT_TEMPERATURE},
        });

        log::debug!("ollama: vision completion with model {model}");
        retry::with_retries("ollama", self.config.max_retries, || self.post_chat(&body)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
