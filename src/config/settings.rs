//! Enhancement settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Provider credentials are plain optional strings here; validation happens
//! in [`resolve_providers`](crate::config::resolve_providers).

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Per-provider settings
// ---------------------------------------------------------------------------

/// Settings for the Groq cloud provider (OpenAI-compatible API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroqSettings {
    /// Groq API key.  `None` disables the provider.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Text completion model.
    pub model: String,
    /// Vision model — `None` means vision requests are never routed here.
    pub vision_model: Option<String>,
}

impl Default for GroqSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.3-70b-versatile".into(),
            vision_model: Some("llama-3.2-90b-vision-preview".into()),
        }
    }
}

/// Settings for the DeepSeek cloud provider (OpenAI-compatible API).
///
/// DeepSeek ships a code-specialised model alongside the general chat model;
/// the adapter switches to it automatically for code documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepseekSettings {
    /// DeepSeek API key.  `None` disables the provider.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// General chat model.
    pub model: String,
    /// Code-specialised model.
    pub coder_model: String,
}

impl Default for DeepseekSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".into(),
            model: "deepseek-chat".into(),
            coder_model: "deepseek-coder".into(),
        }
    }
}

/// Settings for the Google Gemini provider.
///
/// Gemini models are natively multimodal, so the text model doubles as the
/// vision model unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiSettings {
    /// Google AI API key.  `None` disables the provider.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Model identifier (e.g. `"gemini-1.5-flash"`).
    pub model: String,
    /// Vision model override — defaults to `model` when `None`.
    pub vision_model: Option<String>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-1.5-flash".into(),
            vision_model: None,
        }
    }
}

/// Settings for a locally hosted Ollama server.
///
/// No credential is required; the provider is enabled whenever it appears in
/// the priority list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaSettings {
    /// Ollama API base URL (e.g. `http://localhost:11434/api`).
    pub base_url: String,
    /// Text completion model.
    pub model: String,
    /// Vision model — `None` disables vision routing for Ollama.
    pub vision_model: Option<String>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/api".into(),
            model: "qwen2.5:7b".into(),
            vision_model: Some("llava:7b".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// EnhancementSettings  (top-level)
// ---------------------------------------------------------------------------

/// Top-level enhancement configuration, serialised as `enhancement.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use ocr_enhance::config::EnhancementSettings;
///
/// // Load (returns Default when the file is missing)
/// let settings = EnhancementSettings::load_from("enhancement.toml".as_ref()).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementSettings {
    /// Master switch — when `false` the orchestrator short-circuits to
    /// pass-through and no provider is ever contacted.
    pub enabled: bool,
    /// Per-adapter HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Transport retries per adapter call.
    pub max_retries: u32,
    /// Route requests carrying a page image to vision-capable providers.
    pub use_vision_when_available: bool,
    /// Provider priority list, `"name:priority"` pairs separated by commas
    /// (e.g. `"groq:1,deepseek:2,gemini:3,ollama:4"`).  Lower number wins.
    /// A provider absent from this list is disabled.
    pub provider_priority: String,
    /// Groq provider settings.
    pub groq: GroqSettings,
    /// DeepSeek provider settings.
    pub deepseek: DeepseekSettings,
    /// Gemini provider settings.
    pub gemini: GeminiSettings,
    /// Ollama provider settings.
    pub ollama: OllamaSettings,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            max_retries: 2,
            use_vision_when_available: true,
            provider_priority: "groq:1,deepseek:2,gemini:3,ollama:4".into(),
            groq: GroqSettings::default(),
            deepseek: DeepseekSettings::default(),
            gemini: GeminiSettings::default(),
            ollama: OllamaSettings::default(),
        }
    }
}

impl EnhancementSettings {
    /// Load settings from a TOML file.
    ///
    /// Returns `Ok(EnhancementSettings::default())` when the file does not
    /// exist yet (first-run scenario) so callers never need to special-case
    /// a missing file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
