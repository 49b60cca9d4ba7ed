//! Configuration module for the enhancement core.
//!
//! Provides [`EnhancementSettings`] (top-level options plus per-provider
//! sub-configs) with TOML persistence, and [`resolve_providers`], which turns
//! settings into the validated, priority-sorted [`ProviderConfig`] list the
//! rest of the crate is built from.

pub mod resolver;
pub mod settings;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use resolver::{parse_priorities, resolve_providers, ProviderConfig, ProviderName};
pub use settings::{
    DeepseekSettings, EnhancementSettings, GeminiSettings, GroqSettings, OllamaSettings,
};
