//! Provider registry — live adapters plus their status records.
//!
//! [`ProviderRegistry`] owns the `name → (adapter, status)` map.  Adapters
//! are shared-immutable (`Arc<dyn Provider>`, built once from config);
//! status records are the one mutable table in the crate, guarded by a
//! `RwLock` and mutated only through [`ProviderRegistry::update`] — which the
//! [`ProviderManager`](crate::manager::ProviderManager) alone calls.  Readers
//! take the lock briefly and copy; nobody holds it across I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{ProviderConfig, ProviderName};
use crate::providers::{
    DeepseekProvider, GeminiProvider, GroqProvider, OllamaProvider, Provider,
};

// ---------------------------------------------------------------------------
// ErrorCause
// ---------------------------------------------------------------------------

/// Why a provider was last marked unavailable.
///
/// `None` is the healthy state; any other value implies `available == false`
/// at the time it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCause {
    /// No recorded failure.
    None,
    /// Daily quota or credits exhausted.
    QuotaExceeded,
    /// Too many requests.
    RateLimited,
    /// Network-level failure or timeout.
    Transport,
    /// Unusable response from the vendor.
    BadResponse,
    /// Credential rejected — requires a restart to clear.
    InvalidAuth,
    /// Broken request shape — requires a restart to clear.
    Fatal,
}

impl ErrorCause {
    /// Short label used in log lines and failure summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCause::None => "ok",
            ErrorCause::QuotaExceeded => "quota exceeded",
            ErrorCause::RateLimited => "rate limited",
            ErrorCause::Transport => "transport error",
            ErrorCause::BadResponse => "bad response",
            ErrorCause::InvalidAuth => "invalid credentials",
            ErrorCause::Fatal => "fatal error",
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderStatus
// ---------------------------------------------------------------------------

/// Health record for one provider, one per known adapter.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Which provider this record tracks.
    pub name: ProviderName,
    /// `false` after any failure, until the cooldown expires or a health
    /// probe succeeds.
    pub available: bool,
    /// When the record was last touched.
    pub last_checked: Instant,
    /// Round-trip latency of the last successful call or probe.
    pub last_latency: Option<Duration>,
    /// Cause of the last failure; `ErrorCause::None` when healthy.
    pub last_error: ErrorCause,
    /// When the provider may be tried again.  `None` while healthy — and
    /// also for `InvalidAuth`/`Fatal`, which sideline the provider for the
    /// rest of the session.
    pub cooldown_until: Option<Instant>,
    /// Whether the adapter can take an image attachment.
    pub supports_vision: bool,
}

impl ProviderStatus {
    fn new(name: ProviderName, supports_vision: bool) -> Self {
        Self {
            name,
            available: true,
            last_checked: Instant::now(),
            last_latency: None,
            last_error: ErrorCause::None,
            cooldown_until: None,
            supports_vision,
        }
    }

    /// Whether selection may try this provider right now.
    ///
    /// A provider is eligible while healthy, and again once its cooldown has
    /// expired.  `InvalidAuth`/`Fatal` never set a cooldown, so they stay
    /// ineligible for the session.
    pub fn is_eligible(&self, now: Instant) -> bool {
        self.available || self.cooldown_until.is_some_and(|until| until <= now)
    }

    /// Remaining cooldown, when one is running.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let until = self.cooldown_until?;
        (until > now).then(|| until - now)
    }

    fn health_view(&self, now: Instant) -> ProviderHealth {
        let status = if self.available {
            HealthState::Available
        } else {
            match self.last_error {
                ErrorCause::QuotaExceeded => HealthState::QuotaExceeded,
                ErrorCause::RateLimited => HealthState::RateLimited,
                _ => HealthState::Unavailable,
            }
        };
        ProviderHealth {
            status,
            response_time_ms: self.last_latency.map(|d| d.as_millis() as u64),
            cooldown_remaining_ms: self.cooldown_remaining(now).map(|d| d.as_millis() as u64),
            supports_vision: self.supports_vision,
        }
    }
}

// ---------------------------------------------------------------------------
// Health snapshot  (serialised by the host's health endpoint)
// ---------------------------------------------------------------------------

/// Coarse provider state for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Ready to serve requests.
    Available,
    /// On quota cooldown.
    QuotaExceeded,
    /// On rate-limit cooldown.
    RateLimited,
    /// Failed for another reason.
    Unavailable,
}

/// One provider's row in the health snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    /// Coarse state.
    pub status: HealthState,
    /// Last observed round-trip latency.
    pub response_time_ms: Option<u64>,
    /// Milliseconds until the provider re-enters rotation, when cooling down.
    pub cooldown_remaining_ms: Option<u64>,
    /// Whether the provider accepts image attachments.
    pub supports_vision: bool,
}

/// Defensive copy of the whole status table plus the sticky preferred name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Per-provider health, keyed by provider name.
    pub providers: BTreeMap<String, ProviderHealth>,
    /// The provider that served the last successful request, if any.
    pub preferred_provider: Option<String>,
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

struct RegistryEntry {
    name: ProviderName,
    priority: u32,
    adapter: Arc<dyn Provider>,
}

/// Holds the adapters (priority-sorted, immutable) and their status table.
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
    statuses: RwLock<HashMap<ProviderName, ProviderStatus>>,
}

impl ProviderRegistry {
    /// Build adapters from resolved configs.
    pub fn from_configs(configs: Vec<ProviderConfig>) -> Self {
        let adapters = configs
            .into_iter()
            .map(|config| {
                let priority = config.priority;
                let adapter: Arc<dyn Provider> = match config.name {
                    ProviderName::Groq => Arc::new(GroqProvider::new(config)),
                    ProviderName::Deepseek => Arc::new(DeepseekProvider::new(config)),
                    ProviderName::Gemini => Arc::new(GeminiProvider::new(config)),
                    ProviderName::Ollama => Arc::new(OllamaProvider::new(config)),
                };
                (priority, adapter)
            })
            .collect();
        Self::with_adapters(adapters)
    }

    /// Build from pre-constructed adapters (custom or test doubles).
    pub fn with_adapters(adapters: Vec<(u32, Arc<dyn Provider>)>) -> Self {
        let mut entries: Vec<RegistryEntry> = adapters
            .into_iter()
            .map(|(priority, adapter)| RegistryEntry {
                name: adapter.name(),
                priority,
                adapter,
            })
            .collect();
        entries.sort_by_key(|e| e.priority);

        let statuses = entries
            .iter()
            .map(|e| (e.name, ProviderStatus::new(e.name, e.adapter.supports_vision())))
            .collect();

        log::info!("provider registry initialised with {} adapter(s)", entries.len());
        Self {
            entries,
            statuses: RwLock::new(statuses),
        }
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adapters in ascending priority order.
    pub fn by_priority(&self) -> Vec<Arc<dyn Provider>> {
        self.entries.iter().map(|e| Arc::clone(&e.adapter)).collect()
    }

    /// Look up one adapter by name.
    pub fn adapter(&self, name: ProviderName) -> Option<Arc<dyn Provider>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.adapter))
    }

    /// Copy of one provider's status record.
    pub fn status_of(&self, name: ProviderName) -> Option<ProviderStatus> {
        self.statuses.read().unwrap_or_else(|e| e.into_inner()).get(&name).cloned()
    }

    /// Defensive copy of every status record, in priority order.
    pub fn status_snapshot(&self) -> Vec<ProviderStatus> {
        let statuses = self.statuses.read().unwrap_or_else(|e| e.into_inner());
        self.entries
            .iter()
            .filter_map(|e| statuses.get(&e.name).cloned())
            .collect()
    }

    /// Serialised health view for the host's health endpoint.
    pub fn health_snapshot(&self, preferred: Option<ProviderName>) -> HealthSnapshot {
        let now = Instant::now();
        let providers = self
            .status_snapshot()
            .into_iter()
            .map(|status| (status.name.to_string(), status.health_view(now)))
            .collect();
        HealthSnapshot {
            providers,
            preferred_provider: preferred.map(|name| name.to_string()),
        }
    }

    /// Apply a mutation to one status record under a short write lock.
    ///
    /// The closure must not block; callers do all I/O outside this call.
    pub fn update(&self, name: ProviderName, mutate: impl FnOnce(&mut ProviderStatus)) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = statuses.get_mut(&name) {
            mutate(status);
            status.last_checked = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
