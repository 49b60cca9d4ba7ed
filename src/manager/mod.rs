//! Provider manager — selection, fallback, cooldowns, sticky preference.
//!
//! [`ProviderManager`] is the only component that mutates provider status.
//! Each [`dispatch`](ProviderManager::dispatch) call walks the eligible
//! adapters in order (sticky preferred first, then ascending priority,
//! vision-capable first when the request prefers vision), interprets every
//! [`ProviderError`] into a status update plus cooldown, and returns the
//! first success.  The caller sees exactly three outcomes: a completion, an
//! [`AllFailed`](DispatchError::AllFailed) summary, or
//! [`Cancelled`](DispatchError::Cancelled).
//!
//! A background task ([`spawn_health_refresh`](ProviderManager::spawn_health_refresh))
//! re-probes sidelined providers around cooldown expiry so the next dispatch
//! sees fresh eligibility without spending a trial request.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, ProviderName};
use crate::enhance::DocumentType;
use crate::providers::{ChatMessage, CompletionOptions, Provider, ProviderError};
use crate::registry::{ErrorCause, HealthSnapshot, ProviderRegistry};

/// Cooldown after quota exhaustion, absent a vendor reset hint.
const QUOTA_COOLDOWN: Duration = Duration::from_secs(60 * 60);
/// Cooldown after a rate limit, absent a `retry-after` hint.
const RATE_COOLDOWN: Duration = Duration::from_secs(60);
/// Cooldown after a transport failure or unusable response.
const TRANSIENT_COOLDOWN: Duration = Duration::from_secs(5 * 60);
/// How often the background refresh runs.
const HEALTH_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Probe providers whose cooldown expires within this window, not only
/// already-expired ones, so they are usually healthy again by the time the
/// cooldown lapses.
const PROBE_HORIZON: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// One dispatch attempt's worth of input, borrowed from the orchestrator.
#[derive(Debug, Clone)]
pub struct DispatchRequest<'a> {
    /// Neutral chat turns for the text path.
    pub messages: &'a [ChatMessage],
    /// Document type hint, forwarded to adapters.
    pub document_type: DocumentType,
    /// Prompt for the vision path; used only when `image` is present.
    pub vision_prompt: Option<&'a str>,
    /// Source page image, when the caller has one.
    pub image: Option<&'a [u8]>,
    /// Put vision-capable adapters at the front of the walk.
    pub prefer_vision: bool,
    /// Response token budget.
    pub max_tokens: Option<u32>,
}

/// A successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The provider that answered.
    pub provider: ProviderName,
    /// The model that served the request.
    pub model: String,
    /// The generated text.
    pub text: String,
    /// Round-trip latency of the successful attempt.
    pub latency: Duration,
    /// How many adapters were attempted, including the successful one.
    pub attempts: usize,
    /// Prompt tokens, when the vendor reported usage.
    pub tokens_in: Option<u32>,
    /// Completion tokens, when the vendor reported usage.
    pub tokens_out: Option<u32>,
}

/// Why a dispatch returned no completion.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Every eligible adapter failed (or none was eligible).  Carries the
    /// per-provider causes in the order they were attempted.
    #[error("all providers failed")]
    AllFailed(Vec<(ProviderName, ErrorCause)>),

    /// The caller's cancellation token fired.  No status was updated —
    /// cancellation is not evidence of provider failure.
    #[error("request cancelled")]
    Cancelled,
}

fn cause_of(err: &ProviderError) -> ErrorCause {
    match err {
        ProviderError::InvalidAuth(_) => ErrorCause::InvalidAuth,
        ProviderError::QuotaExceeded { .. } => ErrorCause::QuotaExceeded,
        ProviderError::RateLimited { .. } => ErrorCause::RateLimited,
        ProviderError::Transport(_) => ErrorCause::Transport,
        ProviderError::BadResponse(_) => ErrorCause::BadResponse,
        ProviderError::Fatal(_) => ErrorCause::Fatal,
    }
}

/// Cooldown for a failure, honouring vendor hints.  `None` sidelines the
/// provider for the rest of the session.
fn cooldown_for(err: &ProviderError) -> Option<Duration> {
    match err {
        ProviderError::QuotaExceeded { reset_hint, .. } => {
            Some(reset_hint.unwrap_or(QUOTA_COOLDOWN))
        }
        ProviderError::RateLimited { retry_after, .. } => {
            Some(retry_after.unwrap_or(RATE_COOLDOWN))
        }
        ProviderError::Transport(_) | ProviderError::BadResponse(_) => Some(TRANSIENT_COOLDOWN),
        ProviderError::InvalidAuth(_) | ProviderError::Fatal(_) => None,
    }
}

// ---------------------------------------------------------------------------
// ProviderManager
// ---------------------------------------------------------------------------

/// Owns the registry and drives the fallback walk.
pub struct ProviderManager {
    registry: ProviderRegistry,
    /// The last provider that returned a success — tried first next time.
    preferred: RwLock<Option<ProviderName>>,
}

impl ProviderManager {
    /// Build adapters from resolved configs and wrap them in a manager.
    pub fn new(configs: Vec<ProviderConfig>) -> Self {
        Self::with_registry(ProviderRegistry::from_configs(configs))
    }

    /// Wrap an existing registry (used with custom or test adapters).
    pub fn with_registry(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            preferred: RwLock::new(None),
        }
    }

    /// The registry this manager owns.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The sticky preferred provider, if one is set.
    pub fn preferred(&self) -> Option<ProviderName> {
        *self.preferred.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Serialised health view for the host's health endpoint.
    pub fn status_snapshot(&self) -> HealthSnapshot {
        self.registry.health_snapshot(self.preferred())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Walk the eligible adapters until one answers.
    ///
    /// Attempts are strictly sequential; a fallback begins only after the
    /// prior attempt completes or times out.  `cancel` is checked between
    /// attempts and raced against the in-flight HTTP call.
    pub async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, DispatchError> {
        let candidates = self.select_candidates(&request);

        if candidates.is_empty() {
            log::warn!("dispatch: no eligible providers");
            return Err(DispatchError::AllFailed(Vec::new()));
        }

        let opts = CompletionOptions {
            document_type: request.document_type,
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let mut failures: Vec<(ProviderName, ErrorCause)> = Vec::new();
        let mut attempts = 0usize;

        for adapter in candidates {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            let name = adapter.name();
            attempts += 1;
            log::info!("dispatch: attempting {name}");

            let started = Instant::now();
            let call = async {
                match (request.image, request.vision_prompt, adapter.as_vision()) {
                    (Some(image), Some(prompt), Some(vision)) => {
                        vision.complete_vision(prompt, image, &opts).await
                    }
                    _ => adapter.complete_text(request.messages, &opts).await,
                }
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                result = call => result,
            };

            match result {
                Ok(completion) => {
                    let latency = started.elapsed();
                    self.record_success(name, latency);
                    log::info!("dispatch: {name} answered in {}ms", latency.as_millis());
                    return Ok(DispatchOutcome {
                        provider: name,
                        model: completion.model,
                        text: completion.text,
                        latency,
                        attempts,
                        tokens_in: completion.tokens_in,
                        tokens_out: completion.tokens_out,
                    });
                }
                Err(err) => {
                    log::warn!("dispatch: {name} failed ({err}), trying next provider");
                    self.record_failure(name, &err);
                    failures.push((name, cause_of(&err)));
                }
            }
        }

        log::error!("dispatch: all {attempts} provider(s) failed");
        Err(DispatchError::AllFailed(failures))
    }

    /// Build the attempt order: eligible adapters ascending by priority,
    /// sticky preferred moved to the front, vision-capable adapters moved
    /// ahead (stably) when the request prefers vision and carries an image.
    fn select_candidates(&self, request: &DispatchRequest<'_>) -> Vec<Arc<dyn Provider>> {
        let now = Instant::now();
        let mut candidates: Vec<Arc<dyn Provider>> = self
            .registry
            .by_priority()
            .into_iter()
            .filter(|adapter| {
                self.registry
                    .status_of(adapter.name())
                    .is_some_and(|status| status.is_eligible(now))
            })
            .collect();

        if let Some(preferred) = self.preferred() {
            if let Some(pos) = candidates.iter().position(|a| a.name() == preferred) {
                let adapter = candidates.remove(pos);
                candidates.insert(0, adapter);
            }
        }

        if request.prefer_vision && request.image.is_some() {
            let (vision, text): (Vec<_>, Vec<_>) = candidates
                .into_iter()
                .partition(|adapter| adapter.supports_vision());
            candidates = vision.into_iter().chain(text).collect();
        }

        candidates
    }

    // -----------------------------------------------------------------------
    // Status updates
    // -----------------------------------------------------------------------

    fn record_success(&self, name: ProviderName, latency: Duration) {
        self.registry.update(name, |status| {
            status.available = true;
            status.last_error = ErrorCause::None;
            status.cooldown_until = None;
            status.last_latency = Some(latency);
        });
        *self.preferred.write().unwrap_or_else(|e| e.into_inner()) = Some(name);
    }

    fn record_failure(&self, name: ProviderName, err: &ProviderError) {
        let cause = cause_of(err);
        let cooldown = cooldown_for(err);

        self.registry.update(name, |status| {
            status.available = false;
            status.last_error = cause;
            status.cooldown_until = cooldown.map(|d| Instant::now() + d);
        });

        // An error from the currently preferred provider clears the stickiness.
        let mut preferred = self.preferred.write().unwrap_or_else(|e| e.into_inner());
        if *preferred == Some(name) {
            *preferred = None;
        }
    }

    // -----------------------------------------------------------------------
    // Background health refresh
    // -----------------------------------------------------------------------

    /// Spawn the periodic health refresh onto the current tokio runtime.
    ///
    /// The task runs until `cancel` fires.  Every cycle it probes the
    /// sidelined providers whose cooldown has expired or expires soon, in
    /// parallel, and restores the ones that answer.
    pub fn spawn_health_refresh(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_REFRESH_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => manager.refresh_health().await,
                }
            }
            log::info!("health refresh task shutting down");
        })
    }

    /// One refresh cycle: probe every provider due for a retrial.
    pub async fn refresh_health(self: &Arc<Self>) {
        let horizon = Instant::now() + PROBE_HORIZON;
        let due: Vec<ProviderName> = self
            .registry
            .status_snapshot()
            .into_iter()
            .filter(|status| {
                !status.available && status.cooldown_until.is_some_and(|until| until <= horizon)
            })
            .map(|status| status.name)
            .collect();

        if due.is_empty() {
            return;
        }
        log::debug!("health refresh: probing {} provider(s)", due.len());

        let probes: Vec<JoinHandle<()>> = due
            .into_iter()
            .map(|name| {
                let manager = Arc::clone(self);
                tokio::spawn(async move { manager.probe_one(name).await })
            })
            .collect();
        for probe in probes {
            let _ = probe.await;
        }
    }

    async fn probe_one(&self, name: ProviderName) {
        let Some(adapter) = self.registry.adapter(name) else {
            return;
        };

        let started = Instant::now();
        match adapter.check_health().await {
            Ok(()) => {
                let latency = started.elapsed();
                self.registry.update(name, |status| {
                    status.available = true;
                    status.last_error = ErrorCause::None;
                    status.cooldown_until = None;
                    status.last_latency = Some(latency);
                });
                log::info!("health refresh: {name} recovered ({}ms)", latency.as_millis());
            }
            Err(err) => {
                log::debug!("health refresh: {name} still failing ({err})");
                self.record_failure(name, &err);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::providers::{Completion, VisionProvider};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Scripted adapter: pops one outcome per call, then keeps succeeding.
    struct MockProvider {
        name: ProviderName,
        vision: bool,
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        text_calls: AtomicUsize,
        vision_calls: AtomicUsize,
        health_ok: bool,
    }

    impl MockProvider {
        fn new(name: ProviderName) -> Self {
            Self {
                name,
                vision: false,
                script: Mutex::new(VecDeque::new()),
                text_calls: AtomicUsize::new(0),
                vision_calls: AtomicUsize::new(0),
                health_ok: true,
            }
        }

        fn with_vision(mut self) -> Self {
            self.vision = true;
            self
        }

        fn with_failing_health(mut self) -> Self {
            self.health_ok = false;
            self
        }

        fn script(self, outcomes: Vec<Result<String, ProviderError>>) -> Self {
            *self.script.lock().unwrap() = outcomes.into();
            self
        }

        fn next_outcome(&self) -> Result<Completion, ProviderError> {
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("enhanced".into()));
            outcome.map(|text| Completion {
                text,
                model: "mock-model".into(),
                tokens_in: Some(10),
                tokens_out: Some(12),
            })
        }

        fn text_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst)
        }

        fn vision_calls(&self) -> usize {
            self.vision_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> ProviderName {
            self.name
        }

        async fn complete_text(
            &self,
            _messages: &[ChatMessage],
            _opts: &CompletionOptions,
        ) -> Result<Completion, ProviderError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            self.next_outcome()
        }

        async fn check_health(&self) -> Result<(), ProviderError> {
            if self.health_ok {
                Ok(())
            } else {
                Err(ProviderError::Transport("probe failed".into()))
            }
        }

        fn as_vision(&self) -> Option<&dyn VisionProvider> {
            self.vision.then_some(self as &dyn VisionProvider)
        }
    }

    #[async_trait]
    impl VisionProvider for MockProvider {
        async fn complete_vision(
            &self,
            _prompt: &str,
            _image: &[u8],
            _opts: &CompletionOptions,
        ) -> Result<Completion, ProviderError> {
            self.vision_calls.fetch_add(1, Ordering::SeqCst);
            self.next_outcome()
        }
    }

    fn manager_of(adapters: Vec<(u32, Arc<MockProvider>)>) -> ProviderManager {
        let adapters = adapters
            .into_iter()
            .map(|(priority, adapter)| (priority, adapter as Arc<dyn Provider>))
            .collect();
        ProviderManager::with_registry(ProviderRegistry::with_adapters(adapters))
    }

    fn text_request(messages: &[ChatMessage]) -> DispatchRequest<'_> {
        DispatchRequest {
            messages,
            document_type: DocumentType::General,
            vision_prompt: None,
            image: None,
            prefer_vision: false,
            max_tokens: None,
        }
    }

    fn quota_error() -> ProviderError {
        ProviderError::QuotaExceeded {
            message: "daily limit reached".into(),
            reset_hint: None,
        }
    }

    // -----------------------------------------------------------------------
    // Happy path and fallback
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn highest_priority_provider_answers_first() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, Arc::clone(&deepseek))]);

        let messages = [ChatMessage::user("text")];
        let outcome = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderName::Groq);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.tokens_out, Some(12));
        assert_eq!(groq.text_calls(), 1);
        assert_eq!(deepseek.text_calls(), 0);
        assert_eq!(manager.preferred(), Some(ProviderName::Groq));
    }

    #[tokio::test]
    async fn quota_failure_falls_back_and_sets_cooldown() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq).script(vec![Err(quota_error())]));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, Arc::clone(&deepseek))]);

        let messages = [ChatMessage::user("text")];
        let outcome = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderName::Deepseek);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(manager.preferred(), Some(ProviderName::Deepseek));

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(!status.available);
        assert_eq!(status.last_error, ErrorCause::QuotaExceeded);
        let remaining = status.cooldown_remaining(Instant::now()).unwrap();
        assert!(remaining > Duration::from_secs(50 * 60), "default quota cooldown is an hour");
    }

    #[tokio::test]
    async fn sole_provider_quota_failure_is_all_failed_with_cooldown() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq).script(vec![Err(quota_error())]));
        let manager = manager_of(vec![(1, Arc::clone(&groq))]);

        let messages = [ChatMessage::user("text")];
        let err = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::AllFailed(ref causes)
                if causes == &[(ProviderName::Groq, ErrorCause::QuotaExceeded)]
        ));

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(!status.available);
        assert_eq!(status.last_error, ErrorCause::QuotaExceeded);
        assert!(status.cooldown_remaining(Instant::now()).is_some());
    }

    #[tokio::test]
    async fn transient_failures_get_the_short_cooldown() {
        let groq = Arc::new(
            MockProvider::new(ProviderName::Groq)
                .script(vec![Err(ProviderError::BadResponse("garbage".into()))]),
        );
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, groq), (2, deepseek)]);

        let messages = [ChatMessage::user("text")];
        manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert_eq!(status.last_error, ErrorCause::BadResponse);
        let remaining = status.cooldown_remaining(Instant::now()).unwrap();
        assert!(remaining <= TRANSIENT_COOLDOWN);
        assert!(remaining > TRANSIENT_COOLDOWN - Duration::from_secs(60));
    }

    #[tokio::test]
    async fn rate_limit_hint_sets_the_cooldown() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq).script(vec![Err(
            ProviderError::RateLimited {
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(30 * 60)),
            },
        )]));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, groq), (2, deepseek)]);

        let messages = [ChatMessage::user("text")];
        manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert_eq!(status.last_error, ErrorCause::RateLimited);
        let remaining = status.cooldown_remaining(Instant::now()).unwrap();
        assert!(remaining > Duration::from_secs(20 * 60), "retry-after hint should win");
    }

    // -----------------------------------------------------------------------
    // Sticky preferred
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn preferred_provider_is_tried_before_higher_priority() {
        let groq = Arc::new(
            MockProvider::new(ProviderName::Groq)
                .script(vec![Err(ProviderError::Transport("down".into()))]),
        );
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, Arc::clone(&deepseek))]);
        let messages = [ChatMessage::user("text")];
        let cancel = CancellationToken::new();

        // Call 1: groq fails, deepseek answers and becomes preferred.
        manager.dispatch(text_request(&messages), &cancel).await.unwrap();
        assert_eq!(manager.preferred(), Some(ProviderName::Deepseek));

        // Restore groq so both are available for the second call.
        manager.registry().update(ProviderName::Groq, |s| {
            s.available = true;
            s.last_error = ErrorCause::None;
            s.cooldown_until = None;
        });

        // Call 2: deepseek is tried first despite groq's better priority.
        let outcome = manager.dispatch(text_request(&messages), &cancel).await.unwrap();
        assert_eq!(outcome.provider, ProviderName::Deepseek);
        assert_eq!(groq.text_calls(), 1, "groq must not be retried while deepseek sticks");
        assert_eq!(deepseek.text_calls(), 2);
    }

    #[tokio::test]
    async fn error_from_preferred_provider_clears_stickiness() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq).script(vec![
            Ok("first".into()),
            Err(ProviderError::Transport("down".into())),
        ]));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, groq), (2, deepseek)]);
        let messages = [ChatMessage::user("text")];
        let cancel = CancellationToken::new();

        manager.dispatch(text_request(&messages), &cancel).await.unwrap();
        assert_eq!(manager.preferred(), Some(ProviderName::Groq));

        // Groq now fails; deepseek answers and takes over the preference.
        let outcome = manager.dispatch(text_request(&messages), &cancel).await.unwrap();
        assert_eq!(outcome.provider, ProviderName::Deepseek);
        assert_eq!(manager.preferred(), Some(ProviderName::Deepseek));
    }

    // -----------------------------------------------------------------------
    // Cooldowns and eligibility
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn provider_on_cooldown_is_skipped() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, Arc::clone(&deepseek))]);

        manager.registry().update(ProviderName::Groq, |s| {
            s.available = false;
            s.last_error = ErrorCause::RateLimited;
            s.cooldown_until = Some(Instant::now() + Duration::from_secs(60));
        });

        let messages = [ChatMessage::user("text")];
        let outcome = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderName::Deepseek);
        assert_eq!(groq.text_calls(), 0);
    }

    #[tokio::test]
    async fn expired_cooldown_reenables_trial() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, deepseek)]);

        manager.registry().update(ProviderName::Groq, |s| {
            s.available = false;
            s.last_error = ErrorCause::RateLimited;
            s.cooldown_until = Some(Instant::now() - Duration::from_secs(1));
        });

        let messages = [ChatMessage::user("text")];
        let outcome = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderName::Groq);
        assert_eq!(groq.text_calls(), 1);
    }

    #[tokio::test]
    async fn invalid_auth_disables_for_the_session() {
        let groq = Arc::new(
            MockProvider::new(ProviderName::Groq)
                .script(vec![Err(ProviderError::InvalidAuth("bad key".into()))]),
        );
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, deepseek)]);
        let messages = [ChatMessage::user("text")];
        let cancel = CancellationToken::new();

        manager.dispatch(text_request(&messages), &cancel).await.unwrap();

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(!status.available);
        assert_eq!(status.last_error, ErrorCause::InvalidAuth);
        assert!(status.cooldown_until.is_none(), "no cooldown: disabled for the session");

        // A second dispatch must not touch groq at all.
        manager.dispatch(text_request(&messages), &cancel).await.unwrap();
        assert_eq!(groq.text_calls(), 1);
    }

    // -----------------------------------------------------------------------
    // Vision routing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn prefer_vision_moves_vision_capable_adapters_first() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let gemini = Arc::new(MockProvider::new(ProviderName::Gemini).with_vision());
        let manager = manager_of(vec![(1, Arc::clone(&groq)), (2, Arc::clone(&gemini))]);

        let messages = [ChatMessage::user("text")];
        let image = [0xFFu8, 0xD8];
        let request = DispatchRequest {
            messages: &messages,
            document_type: DocumentType::General,
            vision_prompt: Some("read the page"),
            image: Some(&image),
            prefer_vision: true,
            max_tokens: None,
        };

        let outcome = manager.dispatch(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.provider, ProviderName::Gemini);
        assert_eq!(gemini.vision_calls(), 1);
        assert_eq!(gemini.text_calls(), 0);
        assert_eq!(groq.text_calls(), 0, "text-only adapter sits behind the vision partition");
    }

    #[tokio::test]
    async fn image_without_vision_capability_uses_the_text_path() {
        let deepseek = Arc::new(MockProvider::new(ProviderName::Deepseek));
        let manager = manager_of(vec![(1, Arc::clone(&deepseek))]);

        let messages = [ChatMessage::user("text")];
        let image = [0x89u8, b'P', b'N', b'G'];
        let request = DispatchRequest {
            messages: &messages,
            document_type: DocumentType::General,
            vision_prompt: Some("read the page"),
            image: Some(&image),
            prefer_vision: true,
            max_tokens: None,
        };

        let outcome = manager.dispatch(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.provider, ProviderName::Deepseek);
        assert_eq!(deepseek.text_calls(), 1);
        assert_eq!(deepseek.vision_calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Total failure and cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn all_failed_reports_every_cause_in_order() {
        let groq = Arc::new(
            MockProvider::new(ProviderName::Groq)
                .script(vec![Err(ProviderError::Transport("down".into()))]),
        );
        let deepseek =
            Arc::new(MockProvider::new(ProviderName::Deepseek).script(vec![Err(quota_error())]));
        let manager = manager_of(vec![(1, groq), (2, deepseek)]);

        let messages = [ChatMessage::user("text")];
        let err = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DispatchError::AllFailed(causes) => {
                assert_eq!(
                    causes,
                    vec![
                        (ProviderName::Groq, ErrorCause::Transport),
                        (ProviderName::Deepseek, ErrorCause::QuotaExceeded),
                    ]
                );
            }
            other => panic!("expected AllFailed, got {other:?}"),
        }
        assert_eq!(manager.preferred(), None);
    }

    #[tokio::test]
    async fn empty_registry_is_all_failed_with_no_causes() {
        let manager = ProviderManager::with_registry(ProviderRegistry::with_adapters(Vec::new()));
        let messages = [ChatMessage::user("text")];

        let err = manager
            .dispatch(text_request(&messages), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::AllFailed(causes) if causes.is_empty()));
    }

    #[tokio::test]
    async fn cancellation_returns_cancelled_without_status_updates() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let manager = manager_of(vec![(1, Arc::clone(&groq))]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let messages = [ChatMessage::user("text")];
        let err = manager.dispatch(text_request(&messages), &cancel).await.unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(groq.text_calls(), 0);

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(status.available, "cancellation is not evidence of provider failure");
        assert_eq!(manager.preferred(), None);
    }

    // -----------------------------------------------------------------------
    // Health refresh
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn refresh_restores_providers_whose_cooldown_lapsed() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let manager = Arc::new(manager_of(vec![(1, Arc::clone(&groq))]));

        manager.registry().update(ProviderName::Groq, |s| {
            s.available = false;
            s.last_error = ErrorCause::Transport;
            s.cooldown_until = Some(Instant::now() - Duration::from_secs(1));
        });

        manager.refresh_health().await;

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(status.available);
        assert_eq!(status.last_error, ErrorCause::None);
        assert!(status.last_latency.is_some());
    }

    #[tokio::test]
    async fn refresh_leaves_failing_providers_on_cooldown() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq).with_failing_health());
        let manager = Arc::new(manager_of(vec![(1, Arc::clone(&groq))]));

        manager.registry().update(ProviderName::Groq, |s| {
            s.available = false;
            s.last_error = ErrorCause::RateLimited;
            s.cooldown_until = Some(Instant::now() - Duration::from_secs(1));
        });

        manager.refresh_health().await;

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(!status.available);
        assert_eq!(status.last_error, ErrorCause::Transport);
        assert!(status.cooldown_remaining(Instant::now()).is_some());
    }

    #[tokio::test]
    async fn refresh_skips_session_disabled_providers() {
        let groq = Arc::new(MockProvider::new(ProviderName::Groq));
        let manager = Arc::new(manager_of(vec![(1, Arc::clone(&groq))]));

        manager.registry().update(ProviderName::Groq, |s| {
            s.available = false;
            s.last_error = ErrorCause::InvalidAuth;
            s.cooldown_until = None;
        });

        manager.refresh_health().await;

        let status = manager.registry().status_of(ProviderName::Groq).unwrap();
        assert!(!status.available, "auth failures stay sidelined");
        assert_eq!(status.last_error, ErrorCause::InvalidAuth);
    }
}
