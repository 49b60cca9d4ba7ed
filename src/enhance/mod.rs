//! Enhancement orchestrator — the single entry point of the crate.
//!
//! This module provides:
//! * [`EnhancementOrchestrator`] — classifies the document, renders the
//!   prompt, dispatches through the [`ProviderManager`], validates the
//!   response and computes improvement tags.
//! * [`EnhancementRequest`] / [`EnhancementResult`] — the invocation
//!   contract.  The result **always** carries the untouched original text,
//!   even when every provider fails; downstream callers treat a failed
//!   enhancement as a successful OCR pass with no enhancement.
//! * [`DocumentType`] / [`DocumentClassifier`] — the closed document-type
//!   enumeration and its heuristics.
//! * [`PromptCatalog`] / [`PromptTemplate`] — per-type prompt templates.
//! * [`ImprovementTag`] — advisory labels for what the enhancement fixed.
//!
//! The orchestrator never panics and never returns an error type: every
//! failure mode collapses into a result with `enhanced_text == None` and a
//! descriptive `error_message`.

pub mod document;
pub mod improvements;
pub mod prompt;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{EnhancementSettings, ProviderName};
use crate::manager::{DispatchError, DispatchRequest, ProviderManager};
use crate::providers::message::default_max_tokens;
use crate::providers::ChatMessage;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use document::{DocumentClassifier, DocumentType};
pub use improvements::{detect_improvements, ImprovementTag};
pub use prompt::{PromptCatalog, PromptTemplate, RenderedPrompt};

/// Reject responses longer than this multiple of the input character count
/// (guards against runaway repetition).
const MAX_LENGTH_RATIO: usize = 10;

// ---------------------------------------------------------------------------
// EnhancementRequest
// ---------------------------------------------------------------------------

/// One enhancement call's worth of input.
#[derive(Debug, Clone)]
pub struct EnhancementRequest {
    /// The raw OCR text.  Must be non-empty.
    pub text: String,
    /// Document type, when the caller knows it.  `None` triggers
    /// classification.
    pub document_type: Option<DocumentType>,
    /// The source page image, when available.
    pub image: Option<Vec<u8>>,
    /// Put vision-capable providers first when an image is present.
    pub prefer_vision: bool,
    /// Set by upstream pipelines that already ran an enhancement pass; the
    /// orchestrator refuses to run a second one.
    pub already_enhanced: bool,
}

impl EnhancementRequest {
    /// Request enhancement of `text` with everything else defaulted.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_type: None,
            image: None,
            prefer_vision: false,
            already_enhanced: false,
        }
    }

    /// Set a known document type (skips classification).
    pub fn with_document_type(mut self, doc: DocumentType) -> Self {
        self.document_type = Some(doc);
        self
    }

    /// Attach the source page image.
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Prefer vision-capable providers for this request.
    pub fn prefer_vision(mut self, prefer: bool) -> Self {
        self.prefer_vision = prefer;
        self
    }

    /// Mark the text as already enhanced upstream.
    pub fn already_enhanced(mut self, already: bool) -> Self {
        self.already_enhanced = already;
        self
    }
}

// ---------------------------------------------------------------------------
// EnhancementResult
// ---------------------------------------------------------------------------

/// The outcome of one enhancement call.
///
/// `original_text` is always the request text, verbatim.  `enhanced_text`
/// is populated exactly when a provider produced a valid correction.
#[derive(Debug, Clone, Serialize)]
pub struct EnhancementResult {
    /// The request text, unchanged.
    pub original_text: String,
    /// The corrected text, when a provider succeeded.
    pub enhanced_text: Option<String>,
    /// The provider that produced the response.
    pub provider_used: Option<ProviderName>,
    /// The model that served the request.
    pub model_used: Option<String>,
    /// The document type the enhancement ran with (classified or caller-supplied).
    pub document_type: DocumentType,
    /// Wall-clock time of the whole call in milliseconds.
    pub elapsed_ms: u64,
    /// Prompt tokens, when the vendor reported usage.
    pub tokens_in: Option<u32>,
    /// Completion tokens, when the vendor reported usage.
    pub tokens_out: Option<u32>,
    /// Advisory labels for what changed.
    pub improvements: Vec<ImprovementTag>,
    /// `true` when more than one provider was attempted, or when all failed.
    pub fallback_occurred: bool,
    /// Why there is no enhanced text, when there is none.
    pub error_message: Option<String>,
    /// Flagged metadata (e.g. a prompt-catalog fallback).
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// EnhancementOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete enhancement flow on top of a [`ProviderManager`].
pub struct EnhancementOrchestrator {
    manager: Arc<ProviderManager>,
    catalog: PromptCatalog,
    classifier: DocumentClassifier,
    enabled: bool,
    use_vision: bool,
}

impl EnhancementOrchestrator {
    /// Build the orchestrator from settings.
    ///
    /// Only `enabled` and `use_vision_when_available` are read here; the
    /// provider stack was already resolved when `manager` was built.
    pub fn new(manager: Arc<ProviderManager>, settings: &EnhancementSettings) -> Self {
        Self {
            manager,
            catalog: PromptCatalog::new(),
            classifier: DocumentClassifier::new(),
            enabled: settings.enabled,
            use_vision: settings.use_vision_when_available,
        }
    }

    /// Replace the prompt catalog (caller-supplied template overrides).
    pub fn with_catalog(mut self, catalog: PromptCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Enhance one piece of OCR text.
    ///
    /// Never panics; the result always carries the original text.  `cancel`
    /// aborts between provider attempts and in-flight HTTP calls; a
    /// cancelled call does not count against any provider.
    pub async fn enhance(
        &self,
        request: EnhancementRequest,
        cancel: &CancellationToken,
    ) -> EnhancementResult {
        let started = Instant::now();

        // ── 1. Short-circuit guards ──────────────────────────────────────
        if !self.enabled {
            log::debug!("enhancement disabled, passing text through");
            return self.passthrough(request, started, "enhancement disabled");
        }
        if request.already_enhanced {
            log::debug!("text already enhanced upstream, skipping second pass");
            return self.passthrough(request, started, "text already enhanced, skipping");
        }
        if request.text.is_empty() {
            return self.passthrough(request, started, "empty input text");
        }

        // ── 2. Document type ─────────────────────────────────────────────
        let document_type = match request.document_type {
            Some(doc) => doc,
            None => {
                let doc = self.classifier.classify(&request.text);
                log::debug!("classified document as {doc}");
                doc
            }
        };

        // ── 3. Prompt ────────────────────────────────────────────────────
        let (template, catalog_fallback) = self.catalog.template_for(document_type);
        let rendered = template.render(&request.text);
        let mut notes = Vec::new();
        if catalog_fallback {
            notes.push(format!("no prompt template for {document_type}, used general"));
        }

        // ── 4. Neutral messages ──────────────────────────────────────────
        let messages = [
            ChatMessage::system(rendered.system.clone()),
            ChatMessage::user(rendered.user.clone()),
        ];
        let max_tokens = default_max_tokens(&messages);

        let image = if self.use_vision {
            request.image.as_deref()
        } else {
            None
        };

        // ── 5. Dispatch ──────────────────────────────────────────────────
        let dispatched = {
            let dispatch = DispatchRequest {
                messages: &messages,
                document_type,
                vision_prompt: image.is_some().then(|| self.catalog.vision_prompt()),
                image,
                prefer_vision: request.prefer_vision,
                max_tokens: Some(max_tokens),
            };
            self.manager.dispatch(dispatch, cancel).await
        };

        let outcome = match dispatched {
            Ok(outcome) => outcome,
            Err(DispatchError::Cancelled) => {
                log::debug!("enhancement cancelled by caller");
                return self.passthrough(request, started, "enhancement cancelled");
            }
            Err(DispatchError::AllFailed(causes)) => {
                let message = if causes.is_empty() {
                    "no providers available".to_string()
                } else {
                    let chain: Vec<String> = causes
                        .iter()
                        .map(|(name, cause)| format!("{name}: {}", cause.as_str()))
                        .collect();
                    format!("all providers failed ({})", chain.join("; "))
                };
                log::error!("enhancement failed: {message}");
                return EnhancementResult {
                    original_text: request.text,
                    enhanced_text: None,
                    provider_used: None,
                    model_used: None,
                    document_type,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    tokens_in: None,
                    tokens_out: None,
                    improvements: Vec::new(),
                    fallback_occurred: true,
                    error_message: Some(message),
                    notes,
                };
            }
        };

        // ── 6. Validate the response ─────────────────────────────────────
        let fallback_occurred = outcome.attempts >= 2;
        let enhanced = outcome.text.trim().to_string();

        let rejection = if enhanced.is_empty() {
            Some("provider returned an empty enhancement".to_string())
        } else if enhanced == rendered.user.trim() {
            Some("provider echoed the prompt back".to_string())
        } else if enhanced.chars().count() > request.text.chars().count() * MAX_LENGTH_RATIO {
            Some("enhanced text exceeded the length sanity bound".to_string())
        } else {
            None
        };

        if let Some(reason) = rejection {
            log::warn!("rejecting response from {}: {reason}", outcome.provider);
            return EnhancementResult {
                original_text: request.text,
                enhanced_text: None,
                provider_used: Some(outcome.provider),
                model_used: Some(outcome.model),
                document_type,
                elapsed_ms: started.elapsed().as_millis() as u64,
                tokens_in: outcome.tokens_in,
                tokens_out: outcome.tokens_out,
                improvements: Vec::new(),
                fallback_occurred,
                error_message: Some(reason),
                notes,
            };
        }

        // ── 7. Improvement tags and result ───────────────────────────────
        let improvements = detect_improvements(&request.text, &enhanced);
        log::info!(
            "enhanced {} chars via {} in {}ms",
            request.text.chars().count(),
            outcome.provider,
            outcome.latency.as_millis()
        );

        EnhancementResult {
            original_text: request.text,
            enhanced_text: Some(enhanced),
            provider_used: Some(outcome.provider),
            model_used: Some(outcome.model),
            document_type,
            elapsed_ms: started.elapsed().as_millis() as u64,
            tokens_in: outcome.tokens_in,
            tokens_out: outcome.tokens_out,
            improvements,
            fallback_occurred,
            error_message: None,
            notes,
        }
    }

    /// A result that hands the input back untouched, with a reason.
    fn passthrough(
        &self,
        request: EnhancementRequest,
        started: Instant,
        reason: &str,
    ) -> EnhancementResult {
        EnhancementResult {
            original_text: request.text,
            enhanced_text: None,
            provider_used: None,
            model_used: None,
            document_type: request.document_type.unwrap_or_default(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            tokens_in: None,
            tokens_out: None,
            improvements: Vec::new(),
            fallback_occurred: false,
            error_message: Some(reason.to_string()),
            notes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
