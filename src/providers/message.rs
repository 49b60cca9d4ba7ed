//! Vendor-neutral chat message form.
//!
//! Adapters translate [`ChatMessage`]s into their vendor's wire format; the
//! neutral form never carries a vendor keyword.  Groq and DeepSeek serialise
//! it directly (their wire format matches), Gemini and Ollama rewrite it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole exchange.
    System,
    /// The caller's content (the OCR text to correct).
    User,
    /// A prior model turn.
    Assistant,
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One role-tagged turn with textual content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// The turn's text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Token estimation
// ---------------------------------------------------------------------------

/// Rough token count for sizing the response budget.
///
/// Uses the common 4-characters-per-token heuristic; never returns 0 so the
/// derived max-token budget stays positive even for one-character inputs.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.chars().count() as u32) / 4).max(1)
}

/// Default response budget: roughly twice the input estimate.
///
/// Adapters clamp this to their own ceiling before putting it on the wire.
pub fn default_max_tokens(messages: &[ChatMessage]) -> u32 {
    let input: u32 = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    input.saturating_mul(2).max(64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
