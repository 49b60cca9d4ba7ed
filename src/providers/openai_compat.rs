//! OpenAI-shaped chat-completion wire helpers.
//!
//! Groq and DeepSeek both speak the OpenAI chat-completions JSON shape
//! (`choices[0].message.content`, `usage.prompt_tokens` /
//! `usage.completion_tokens`), so request building and response parsing live
//! here and the adapters only differ in auth, base URL and model selection.

use serde_json::{json, Value};

use super::error::ProviderError;
use super::message::ChatMessage;
use super::Completion;

// ---------------------------------------------------------------------------
// Request building
// ---------------------------------------------------------------------------

/// Build a `/chat/completions` request body.
///
/// [`ChatMessage`] serialises directly to the wire form, so the neutral
/// message list goes in as-is.
pub fn chat_request_body(
    model: &str,
    messages: &[ChatMessage],
    temperature: f32,
    max_tokens: Option<u32>,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "stream": false,
    });
    if let Some(max) = max_tokens {
        body["max_tokens"] = json!(max);
    }
    body
}

/// Build a vision request body: one user message whose content is a text
/// part plus a base64 data-URL image part.
pub fn vision_request_body(model: &str, prompt: &str, mime: &str, image_base64: &str) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {
                    "url": format!("data:{mime};base64,{image_base64}")
                }}
            ]
        }],
        "temperature": super::DEFAULT_TEMPERATURE,
        "stream": false,
    })
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parse a 2xx chat-completion body into a [`Completion`].
///
/// `fallback_model` fills the model field when the vendor omits it.
pub fn parse_chat_response(body: &str, fallback_model: &str) -> Result<Completion, ProviderError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::BadResponse(format!("unparseable completion body: {e}")))?;

    let text = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::BadResponse("response has no message content".into()))?
        .to_string();

    if text.trim().is_empty() {
        return Err(ProviderError::BadResponse("empty text content".into()));
    }

    let model = data["model"]
        .as_str()
        .unwrap_or(fallback_model)
        .to_string();

    Ok(Completion {
        text,
        model,
        tokens_in: data["usage"]["prompt_tokens"].as_u64().map(|t| t as u32),
        tokens_out: data["usage"]["completion_tokens"].as_u64().map(|t| t as u32),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::message::ChatMessage;

    #[test]
    fn request_body_carries_messages_verbatim() {
        let messages = [
            ChatMessage::system("fix OCR errors"),
            ChatMessage::user("Th1s 1s text"),
        ];
        let body = chat_request_body("llama-3.3-70b-versatile", &messages, 0.1, Some(512));

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Th1s 1s text");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn request_body_omits_max_tokens_when_unset() {
        let messages = [ChatMessage::user("x")];
        let body = chat_request_body("m", &messages, 0.1, None);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn vision_body_uses_data_url_parts() {
        let body = vision_request_body("vision-model", "read this", "image/png", "QUJD");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "read this");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn parses_completion_with_usage() {
        let body = r#"{
            "model": "llama-3.3-70b-versatile",
            "choices": [{"message": {"role": "assistant", "content": "Fixed text."}}],
            "usage": {"prompt_tokens": 21, "completion_tokens": 4}
        }"#;

        let completion = parse_chat_response(body, "fallback").unwrap();
        assert_eq!(completion.text, "Fixed text.");
        assert_eq!(completion.model, "llama-3.3-70b-versatile");
        assert_eq!(completion.tokens_in, Some(21));
        assert_eq!(completion.tokens_out, Some(4));
    }

    #[test]
    fn missing_model_field_uses_fallback() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let completion = parse_chat_response(body, "deepseek-chat").unwrap();
        assert_eq!(completion.model, "deepseek-chat");
        assert_eq!(completion.tokens_in, None);
    }

    #[test]
    fn empty_choices_is_bad_response() {
        let err = parse_chat_response(r#"{"choices": []}"#, "m").unwrap_err();
        assert!(matches!(err, ProviderError::BadResponse(_)));
    }

    #[test]
    fn whitespace_only_content_is_bad_response() {
        let body = r#"{"choices": [{"message": {"content": "   \n"}}]}"#;
        let err = parse_chat_response(body, "m").unwrap_err();
        assert!(matches!(err, ProviderError::BadResponse(_)));
    }

    #[test]
    fn non_json_body_is_bad_response() {
        let err = parse_chat_response("<html>502</html>", "m").unwrap_err();
        assert!(matches!(err, ProviderError::BadResponse(_)));
    }
}
