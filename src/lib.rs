//! Multi-provider AI text enhancement for OCR output.
//!
//! OCR engines produce text with characteristic defects: digit/letter
//! substitutions, missing diacritics, broken punctuation and spacing.  This
//! crate routes the raw text (optionally with the source page image) through
//! one of several LLM providers — Groq, DeepSeek, Gemini, or a local Ollama
//! server — and returns a corrected rendering.  Providers are tried in
//! priority order with automatic fallback; quota and rate-limit errors put a
//! provider on cooldown instead of failing the request, and the original
//! text is always preserved in the result even when every provider fails.
//!
//! The crate is organised in three layers:
//!
//! * [`providers`] — one adapter per vendor behind the [`Provider`] /
//!   [`VisionProvider`] contract, plus the closed [`ProviderError`] taxonomy.
//! * [`registry`] / [`manager`] — the [`ProviderRegistry`] holds adapters and
//!   their [`ProviderStatus`] records; the [`ProviderManager`] selects an
//!   adapter, drives the fallback walk, and maintains cooldowns, the sticky
//!   preferred provider, and the background health refresh.
//! * [`enhance`] — the [`EnhancementOrchestrator`]: document-type
//!   classification, prompt rendering, response validation, and the
//!   failure-preserving [`EnhancementResult`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ocr_enhance::config::{resolve_providers, EnhancementSettings};
//! use ocr_enhance::enhance::{EnhancementOrchestrator, EnhancementRequest};
//! use ocr_enhance::manager::ProviderManager;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = EnhancementSettings::default();
//!     let configs = resolve_providers(&settings);
//!
//!     let manager = Arc::new(ProviderManager::new(configs));
//!     let shutdown = CancellationToken::new();
//!     let _refresh = manager.spawn_health_refresh(shutdown.child_token());
//!
//!     let orchestrator = EnhancementOrchestrator::new(Arc::clone(&manager), &settings);
//!     let request = EnhancementRequest::new("Truong Dai hoc Bach Khoa Ha Noi");
//!     let result = orchestrator.enhance(request, &shutdown).await;
//!
//!     println!("{}", result.enhanced_text.as_deref().unwrap_or(&result.original_text));
//! }
//! ```

pub mod config;
pub mod enhance;
pub mod manager;
pub mod providers;
pub mod registry;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use config::{resolve_providers, EnhancementSettings, ProviderConfig, ProviderName};
pub use enhance::{
    DocumentType, EnhancementOrchestrator, EnhancementRequest, EnhancementResult, ImprovementTag,
};
pub use manager::{DispatchError, DispatchOutcome, ProviderManager};
pub use providers::{ChatMessage, Completion, Provider, ProviderError, Role, VisionProvider};
pub use registry::{ErrorCause, HealthSnapshot, ProviderRegistry, ProviderStatus};
