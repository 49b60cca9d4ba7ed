//! Provider adapters for the enhancement core.
//!
//! This module provides:
//! * [`Provider`] — async trait implemented by every vendor adapter.
//! * [`VisionProvider`] — capability sub-trait for adapters that accept an
//!   image attachment; a text-only adapter simply has no impl, so vision
//!   calls on it cannot be expressed.
//! * [`ChatMessage`] / [`Role`] — the vendor-neutral message form.
//! * [`ProviderError`] — the closed error taxonomy every adapter maps into.
//! * [`GroqProvider`], [`DeepseekProvider`], [`GeminiProvider`],
//!   [`OllamaProvider`] — the four concrete adapters.
//!
//! Each adapter owns its own `reqwest::Client` (per-vendor connection pool,
//! per-call timeout from config) and fully encapsulates its vendor's JSON
//! wire shape.  Transport errors are retried locally under the configured
//! budget (see [`retry`]); everything else is classified and returned
//! immediately.

pub mod deepseek;
pub mod error;
pub mod gemini;
pub mod groq;
pub mod message;
pub mod ollama;
pub mod openai_compat;
pub mod retry;

use async_trait::async_trait;

use crate::config::ProviderName;
use crate::enhance::DocumentType;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use deepseek::DeepseekProvider;
pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use message::{ChatMessage, Role};
pub use ollama::OllamaProvider;

/// Sampling temperature used when the caller does not override it.  Text
/// correction is a low-creativity task.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// A successful completion, with whatever usage accounting the vendor sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The generated text.
    pub text: String,
    /// The model that actually served the request.
    pub model: String,
    /// Prompt tokens consumed, when reported.
    pub tokens_in: Option<u32>,
    /// Completion tokens generated, when reported.
    pub tokens_out: Option<u32>,
}

/// Per-call knobs, all optional.
///
/// `document_type` is a routing hint, not content: DeepSeek switches to its
/// code-specialised model for [`DocumentType::Code`]; the other adapters
/// ignore it.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Model override; `None` uses the adapter's configured model.
    pub model: Option<String>,
    /// Sampling temperature; `None` uses [`DEFAULT_TEMPERATURE`].
    pub temperature: Option<f32>,
    /// Response token budget; `None` lets the vendor decide.  Adapters clamp
    /// this to their own ceiling.
    pub max_tokens: Option<u32>,
    /// Document type of the text being corrected.
    pub document_type: DocumentType,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for provider adapters.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn Provider>` and called from any worker.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which provider this adapter speaks for.
    fn name(&self) -> ProviderName;

    /// Send a text completion request and return the generated text.
    async fn complete_text(
        &self,
        messages: &[ChatMessage],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError>;

    /// Probe the provider with a minimal request.
    ///
    /// `Ok(())` means the provider answered a one-token completion; any
    /// failure is classified through the normal taxonomy.
    async fn check_health(&self) -> Result<(), ProviderError>;

    /// Downcast to the vision capability, when this adapter has it.
    fn as_vision(&self) -> Option<&dyn VisionProvider> {
        None
    }

    /// `true` when [`as_vision`](Self::as_vision) returns a handle.
    fn supports_vision(&self) -> bool {
        self.as_vision().is_some()
    }
}

/// Capability sub-trait for adapters that accept an image attachment.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send a prompt plus image and return the generated text.
    async fn complete_vision(
        &self,
        prompt: &str,
        image: &[u8],
        opts: &CompletionOptions,
    ) -> Result<Completion, ProviderError>;
}

// Compile-time assertion: Box<dyn Provider> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Provider>, _: Box<dyn VisionProvider>) {}
};

// ---------------------------------------------------------------------------
// Image helpers
// ---------------------------------------------------------------------------

/// Guess an image MIME type from magic bytes.  Defaults to JPEG, which is
/// what OCR pipelines hand over when the format is unknown.
pub(crate) fn sniff_image_mime(image: &[u8]) -> &'static str {
    if image.starts_with(b"\x89PNG") {
        "image/png"
    } else if image.starts_with(b"GIF") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
