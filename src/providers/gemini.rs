//! Google Gemini adapter.
//!
//! Gemini speaks its own wire shape: requests are a `contents` array of
//! `{role, parts}` objects where parts are `{text}` or
//! `{inline_data: {mime_type, data}}`, responses come back as
//! `candidates[0].content.parts[0].text`, and the API key travels as a URL
//! query parameter rather than a header.  Gemini has no system role — a
//! system turn is folded into the first user turn.  All current Gemini
//! models accept images natively, so the adapter is always vision-capable.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::{ProviderConfig, ProviderName};

use super::error::{classify_status, parse_retry_after, ProviderError};
use super::message::{ChatMessage, Role};
use super::{
    retry, sniff_image_mime, Completion, CompletionOptions, Provider, VisionProvider,
    DEFAULT_TEMPERATURE,
};

/// Output-token ceiling for Gemini models.
const MAX_OUTPUT_TOKENS: u32 = 8_192;

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

/// Convert neutral messages into Gemini `contents`.
///
/// System turns are prepended to the following user turn (or become a user
/// turn themselves when none follows); assistant turns map to role `model`.
fn to_gemini_contents(messages: &[ChatMessage]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => {
                match contents.last_mut() {
                    Some(last) if last["role"] == "user" => {
                        let existing =
                            last["parts"][0]["text"].as_str().unwrap_or_default().to_string();
                        last["parts"][0]["text"] = json!(format!("{}\n\n{existing}", msg.content));
                    }
                    _ => contents.push(json!({
                        "role": "user",
                        "parts": [{"text": msg.content}]
                    })),
                }
            }
            Role::Assistant => contents.push(json!({
                "role": "model",
                "parts": [{"text": msg.content}]
            })),
            Role::User => {
                // A pending system turn sits at the tail as a user entry; a
                // genuine user turn following it is merged so the pair stays
                // one turn on the wire.
                match contents.last_mut() {
                    Some(last) if last["role"] == "user" => {
                        let existing =
                            last["parts"][0]["text"].as_str().unwrap_or_default().to_string();
                        last["parts"][0]["text"] =
                            json!(format!("{existing}\n\n{}", msg.content));
                    }
                    _ => contents.push(json!({
                        "role": "user",
                        "parts": [{"text": msg.content}]
                    })),
                }
            }
        }
    }

    contents
}

/// Parse a 2xx `generateContent` body.
fn parse_generate_response(body: &str, model: &str) -> Result<Completion, ProviderError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::BadResponse(format!("unparseable gemini body: {e}")))?;

    let text = data["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| ProviderError::BadResponse("gemini response missing text".into()))?
        .to_string();

    if text.trim().is_empty() {
        return Err(ProviderError::BadResponse("empty text content".into()));
    }

    Ok(Completion {
        text,
        model: model.to_string(),
        tokens_in: data["usageMetadata"]["promptTokenCount"]
            .as_u64()
            .map(|t| t as u32),
        tokens_out: data["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .map(|t| t as u32),
    })
}

// ---------------------------------------------------------------------------
// GeminiProvider
// ---------------------------------------------------------------------------

/// Adapter for the Google Gemini API.
pub struct GeminiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    /// Build the adapter from a resolved config.
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    async fn post_generate(&self, model: &str, body: &Value) -> Result<Completion, ProviderError> {
        let url = format!("{}/models/{model}:generateContent", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &text, retry_after));
        }
        parse_generate_response(&text, model)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Gemini
    }

    async fn complete_text(
        &self,
        messages: &[ChatMessage],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let model = opts.model.as_deref().unwrap_or(&self.config.model);
        let temperature = opts.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        let mut body = json!({
            "contents": to_gemini_contents(messages),
            "generationConfig": {"temperature": temperature},
        });
        if let Some(max) = opts.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = json!(max.min(MAX_OUTPUT_TOKENS));
        }

        log::debug!("gemini: chat completion with model {model}");
        retry::with_retries("gemini", self.config.max_retries, || {
            self.post_generate(model, &body)
        })
        .await
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "ping"}]}],
            "generationConfig": {"maxOutputTokens": 5},
        });
        self.post_generate(&self.config.model, &body).await.map(|_| ())
    }

    fn as_vision(&self) -> Option<&dyn VisionProvider> {
        // Gemini models are natively multimodal.
        Some(self)
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
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
            .unwrap_or(&self.config.model);

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": prompt},
                    {"inline_data": {
                        "mime_type": sniff_image_mime(image),
                        "data": BASE64.encode(image),
                    }}
                ]
            }],
            "generationConfig": {"temperature": DEFAULT_TEMPERATURE},
        });

        log::debug!("gemini: vision completion with model {model}");
        retry::with_retries("gemini", self.config.max_retries, || {
            self.post_generate(model, &body)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
