//! Settings → validated provider configurations.
//!
//! [`resolve_providers`] turns [`EnhancementSettings`] into an immutable,
//! priority-sorted list of [`ProviderConfig`]s.  Cloud providers without a
//! credential and providers absent from the priority list are skipped with a
//! warning; the remaining configs are what the
//! [`ProviderManager`](crate::manager::ProviderManager) is built from.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::EnhancementSettings;

// ---------------------------------------------------------------------------
// ProviderName
// ---------------------------------------------------------------------------

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// Groq cloud — fast OpenAI-compatible inference.
    Groq,
    /// DeepSeek cloud — OpenAI-compatible, with a code-specialised model.
    Deepseek,
    /// Google Gemini — natively multimodal.
    Gemini,
    /// Locally hosted Ollama server — no credential required.
    Ollama,
}

impl ProviderName {
    /// The lowercase wire/config name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Groq => "groq",
            ProviderName::Deepseek => "deepseek",
            ProviderName::Gemini => "gemini",
            ProviderName::Ollama => "ollama",
        }
    }

    /// All providers, in default priority order.
    pub fn all() -> [ProviderName; 4] {
        [
            ProviderName::Groq,
            ProviderName::Deepseek,
            ProviderName::Gemini,
            ProviderName::Ollama,
        ]
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(ProviderName::Groq),
            "deepseek" => Ok(ProviderName::Deepseek),
            "gemini" => Ok(ProviderName::Gemini),
            "ollama" => Ok(ProviderName::Ollama),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Resolved, immutable configuration for one provider.
///
/// Built once by [`resolve_providers`] and never mutated afterwards; the
/// adapter constructed from it lives for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Which provider this config describes.
    pub name: ProviderName,
    /// API credential — empty for Ollama.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Text completion model.
    pub model: String,
    /// Vision model, when the provider supports image input.
    pub vision_model: Option<String>,
    /// Secondary model for code documents (DeepSeek only).
    pub coder_model: Option<String>,
    /// Priority — lower number is preferred.
    pub priority: u32,
    /// Per-call HTTP timeout.
    pub timeout: Duration,
    /// Transport retries per adapter call.
    pub max_retries: u32,
}

// ---------------------------------------------------------------------------
// Priority parsing
// ---------------------------------------------------------------------------

/// Parse a `"groq:1,deepseek:2"` priority string.
///
/// Malformed pairs are skipped with a warning.  An input that yields no valid
/// pair at all falls back to the default ordering so a typo in the config
/// never silently disables every provider.
pub fn parse_priorities(priority_string: &str) -> HashMap<ProviderName, u32> {
    let mut priorities = HashMap::new();

    for pair in priority_string.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((name, prio)) = pair.split_once(':') else {
            log::warn!("ignoring malformed priority entry {pair:?} (expected name:number)");
            continue;
        };
        let Ok(name) = ProviderName::from_str(name) else {
            log::warn!("ignoring unknown provider {:?} in priority list", name.trim());
            continue;
        };
        let Ok(prio) = prio.trim().parse::<u32>() else {
            log::warn!("ignoring non-numeric priority for {name}");
            continue;
        };
        priorities.insert(name, prio);
    }

    if priorities.is_empty() {
        log::warn!("priority list {priority_string:?} has no valid entries, using defaults");
        for (i, name) in ProviderName::all().into_iter().enumerate() {
            priorities.insert(name, i as u32 + 1);
        }
    }

    priorities
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Build the priority-sorted list of enabled provider configurations.
///
/// A provider is included when it appears in the priority list, has a base
/// URL and model, and (for the cloud providers) carries a non-empty API key.
/// Ollama needs no credential.
pub fn resolve_providers(settings: &EnhancementSettings) -> Vec<ProviderConfig> {
    let priorities = parse_priorities(&settings.provider_priority);
    let timeout = Duration::from_secs(settings.timeout_secs);
    let mut configs = Vec::new();

    if let Some(priority) = priorities.get(&ProviderName::Groq) {
        match settings.groq.api_key.as_deref() {
            Some(key) if !key.is_empty() => configs.push(ProviderConfig {
                name: ProviderName::Groq,
                api_key: key.to_string(),
                base_url: settings.groq.base_url.clone(),
                model: settings.groq.model.clone(),
                vision_model: settings.groq.vision_model.clone(),
                coder_model: None,
                priority: *priority,
                timeout,
                max_retries: settings.max_retries,
            }),
            _ => log::warn!("groq API key not configured, skipping groq provider"),
        }
    }

    if let Some(priority) = priorities.get(&ProviderName::Deepseek) {
        match settings.deepseek.api_key.as_deref() {
            Some(key) if !key.is_empty() => configs.push(ProviderConfig {
                name: ProviderName::Deepseek,
                api_key: key.to_string(),
                base_url: settings.deepseek.base_url.clone(),
                model: settings.deepseek.model.clone(),
                vision_model: None,
                coder_model: Some(settings.deepseek.coder_model.clone()),
                priority: *priority,
                timeout,
                max_retries: settings.max_retries,
            }),
            _ => log::warn!("deepseek API key not configured, skipping deepseek provider"),
        }
    }

    if let Some(priority) = priorities.get(&ProviderName::Gemini) {
        match settings.gemini.api_key.as_deref() {
            Some(key) if !key.is_empty() => configs.push(ProviderConfig {
                name: ProviderName::Gemini,
                api_key: key.to_string(),
                base_url: settings.gemini.base_url.clone(),
                model: settings.gemini.model.clone(),
                // Gemini models accept images natively.
                vision_model: Some(
                    settings
                        .gemini
                        .vision_model
                        .clone()
                        .unwrap_or_else(|| settings.gemini.model.clone()),
                ),
                coder_model: None,
                priority: *priority,
                timeout,
                max_retries: settings.max_retries,
            }),
            _ => log::warn!("gemini API key not configured, skipping gemini provider"),
        }
    }

    if let Some(priority) = priorities.get(&ProviderName::Ollama) {
        configs.push(ProviderConfig {
            name: ProviderName::Ollama,
            api_key: String::new(),
            base_url: settings.ollama.base_url.clone(),
            model: settings.ollama.model.clone(),
            vision_model: settings.ollama.vision_model.clone(),
            coder_model: None,
            priority: *priority,
            timeout,
            max_retries: settings.max_retries,
        });
    }

    configs.retain(|config| {
        let valid = !config.base_url.is_empty() && !config.model.is_empty();
        if !valid {
            log::warn!("provider {} missing base_url or model, skipping", config.name);
        }
        valid
    });

    configs.sort_by_key(|config| config.priority);

    log::info!("resolved {} provider configuration(s)", configs.len());
    configs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
