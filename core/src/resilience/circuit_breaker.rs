//! Circuit breaker and per-service registry.
//!
//! The circuit breaker tracks consecutive failures per service key. When
//! failures exceed a configurable threshold the circuit *opens* and the
//! service is temporarily skipped. After a cooldown the circuit enters
//! *half-open* state to probe recovery.
//!
//! Unlike a breaker scoped to a single resource type, [`CircuitRegistry`]
//! keys breakers by an arbitrary service name (`&str`) because this process
//! protects five independent external dependencies — the model endpoint, the
//! KV session/document store, the analytics sink, tool RPC backends, and the
//! embedding service — each with its own failure profile.

use std::collections::HashMap;
use std::sync::Mutex;

/// Circuit breaker state for a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy — requests allowed.
    Closed,
    /// Tripped — requests blocked until cooldown expires.
    Open,
    /// Cooldown expired — one probe request allowed.
    HalfOpen,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-service circuit breaker tracking consecutive failures.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_secs: u64,
    /// Consecutive rate-limit hits (for exponential backoff).
    rate_limit_hits: u32,
    /// Unix timestamp when rate-limit cooldown expires.
    rate_limit_until: u64,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds after last failure before Open → HalfOpen.
    pub cooldown_secs: u64,
    /// Consecutive successes required in HalfOpen before closing.
    pub success_threshold: u32,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the default success threshold (2).
    pub fn new(failure_threshold: u32, cooldown_secs: u64) -> Self {
        Self::with_success_threshold(failure_threshold, cooldown_secs, 2)
    }

    /// Create a new circuit breaker with an explicit success threshold.
    pub fn with_success_threshold(
        failure_threshold: u32,
        cooldown_secs: u64,
        success_threshold: u32,
    ) -> Self {
        Self {
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_secs: 0,
            rate_limit_hits: 0,
            rate_limit_until: 0,
            failure_threshold,
            cooldown_secs,
            success_threshold: success_threshold.max(1),
        }
    }

    /// Record a success. In `HalfOpen`, the circuit only closes once
    /// `success_threshold` consecutive successes have landed; in `Closed`
    /// it's a no-op past clearing the failure streak.
    pub fn record_success(&mut self) {
        let was_half_open = self.state() == CircuitState::HalfOpen;
        self.consecutive_successes += 1;
        if was_half_open && self.consecutive_successes < self.success_threshold {
            // Still probing: remain half-open without re-arming the failure
            // count yet, so another failure trips straight back to Open.
            return;
        }
        self.consecutive_failures = 0;
        self.last_failure_secs = 0;
        self.rate_limit_hits = 0;
        self.rate_limit_until = 0;
        self.consecutive_successes = 0;
    }

    /// Record a failure — may trip circuit to Open.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_failure_secs = unix_now();
    }

    /// Record a rate-limit response with adaptive exponential backoff.
    ///
    /// Cooldown doubles each consecutive hit: 2 s, 4 s, 8 s, … capped at 120 s.
    /// Also records a regular failure so the normal circuit-breaker logic applies.
    pub fn record_rate_limit(&mut self) {
        self.rate_limit_hits += 1;
        let cooldown = 2u64
            .saturating_mul(2u64.saturating_pow(self.rate_limit_hits.saturating_sub(1)))
            .min(120);
        self.rate_limit_until = unix_now() + cooldown;
        self.record_failure();
    }

    /// Remaining rate-limit cooldown seconds, or `None` if not rate-limited.
    pub fn rate_limit_cooldown(&self) -> Option<u64> {
        if self.rate_limit_until == 0 {
            return None;
        }
        let now = unix_now();
        if now < self.rate_limit_until {
            Some(self.rate_limit_until - now)
        } else {
            None
        }
    }

    /// Current state of the circuit.
    pub fn state(&self) -> CircuitState {
        if self.rate_limit_cooldown().is_some() {
            return CircuitState::Open;
        }
        if self.consecutive_failures < self.failure_threshold {
            return CircuitState::Closed;
        }
        if unix_now().saturating_sub(self.last_failure_secs) >= self.cooldown_secs {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether the service is available (Closed or HalfOpen).
    pub fn is_available(&self) -> bool {
        !matches!(self.state(), CircuitState::Open)
    }

    /// Consecutive failures currently recorded.
    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, 30)
    }
}

/// Registry of circuit breakers keyed by service name.
///
/// Lives behind an `Arc` in the dispatcher and is threaded into every client
/// constructor, rather than reached for as an ambient singleton.
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    /// Factory for breakers keyed by service that haven't been seen yet.
    defaults: HashMap<String, CircuitBreaker>,
}

/// Well-known service keys this registry is configured for.
pub mod service {
    pub const MODEL: &str = "model";
    pub const KV_STORE: &str = "kv-store";
    pub const ANALYTICS: &str = "analytics";
    pub const TOOL_RPC: &str = "tool-rpc";
    pub const EMBEDDING: &str = "embedding";
}

impl CircuitRegistry {
    /// An empty registry — every unseen service gets a `CircuitBreaker::default()`.
    pub fn new() -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            defaults: HashMap::new(),
        }
    }

    /// Registry pre-seeded with presets for the five named services this
    /// process depends on. Analytics gets a higher failure threshold and
    /// longer cooldown since it's a best-effort sink and should not be
    /// tripped by transient blips in the conversation path.
    pub fn for_service_defaults() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(service::MODEL.to_string(), CircuitBreaker::new(5, 30));
        defaults.insert(service::KV_STORE.to_string(), CircuitBreaker::new(5, 30));
        defaults.insert(service::ANALYTICS.to_string(), CircuitBreaker::new(8, 120));
        defaults.insert(service::TOOL_RPC.to_string(), CircuitBreaker::new(3, 45));
        defaults.insert(service::EMBEDDING.to_string(), CircuitBreaker::new(4, 60));
        Self {
            breakers: Mutex::new(HashMap::new()),
            defaults,
        }
    }

    fn default_for(&self, service: &str) -> CircuitBreaker {
        self.defaults
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record_success(&self, service: &str) {
        let mut guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(service.to_string())
            .or_insert_with(|| self.default_for(service))
            .record_success();
    }

    pub fn record_failure(&self, service: &str) {
        let mut guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(service.to_string())
            .or_insert_with(|| self.default_for(service))
            .record_failure();
    }

    pub fn record_rate_limit(&self, service: &str) {
        let mut guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(service.to_string())
            .or_insert_with(|| self.default_for(service))
            .record_rate_limit();
    }

    pub fn is_available(&self, service: &str) -> bool {
        let mut guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(service.to_string())
            .or_insert_with(|| self.default_for(service))
            .is_available()
    }

    pub fn state(&self, service: &str) -> CircuitState {
        let mut guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(service.to_string())
            .or_insert_with(|| self.default_for(service))
            .state()
    }

    pub fn failure_count(&self, service: &str) -> u32 {
        let guard = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(service).map(|b| b.failure_count()).unwrap_or(0)
    }
}

/// Ordered fallback ladder of endpoint identifiers for a single service,
/// e.g. the model endpoint's inference-profile → cross-region-profile →
/// direct-model-id tiers.
#[derive(Debug, Clone)]
pub struct FallbackLadder {
    service: String,
    endpoints: Vec<String>,
}

impl FallbackLadder {
    pub fn new(service: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            service: service.into(),
            endpoints,
        }
    }

    /// First endpoint in the ladder whose circuit (keyed `service:endpoint`)
    /// is not open.
    pub fn next_available(&self, registry: &CircuitRegistry) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|e| registry.is_available(&format!("{}:{}", self.service, e)))
            .map(|s| s.as_str())
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_available());
    }

    #[test]
    fn circuit_opens_after_threshold() {
        let mut cb = CircuitBreaker::new(2, 9999);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
    }

    #[test]
    fn success_resets_circuit() {
        let mut cb = CircuitBreaker::new(2, 9999);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_after_cooldown() {
        let mut cb = CircuitBreaker::new(1, 0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.is_available());
    }

    #[test]
    fn rate_limit_exponential_backoff() {
        let mut cb = CircuitBreaker::new(10, 9999);
        cb.record_rate_limit();
        assert!(cb.rate_limit_cooldown().is_some());
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn rate_limit_resets_on_success() {
        let mut cb = CircuitBreaker::new(10, 9999);
        cb.record_rate_limit();
        assert!(cb.rate_limit_cooldown().is_some());
        cb.record_success();
        assert!(cb.rate_limit_cooldown().is_none());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn registry_tracks_independent_services() {
        let registry = CircuitRegistry::for_service_defaults();
        for _ in 0..5 {
            registry.record_failure(service::MODEL);
        }
        assert!(!registry.is_available(service::MODEL));
        assert!(registry.is_available(service::ANALYTICS));
    }

    #[test]
    fn registry_analytics_is_more_tolerant() {
        let registry = CircuitRegistry::for_service_defaults();
        for _ in 0..5 {
            registry.record_failure(service::ANALYTICS);
        }
        assert!(registry.is_available(service::ANALYTICS));
    }

    #[test]
    fn registry_unknown_service_gets_default_breaker() {
        let registry = CircuitRegistry::new();
        for _ in 0..5 {
            registry.record_failure("mystery-service");
        }
        assert!(!registry.is_available("mystery-service"));
    }

    #[test]
    fn fallback_ladder_skips_open_endpoint() {
        let registry = CircuitRegistry::new();
        for _ in 0..5 {
            registry.record_failure("model:profile-a");
        }
        let ladder = FallbackLadder::new(
            "model",
            vec!["profile-a".to_string(), "profile-b".to_string()],
        );
        assert_eq!(ladder.next_available(&registry), Some("profile-b"));
    }

    #[test]
    fn fallback_ladder_all_open_returns_none() {
        let registry = CircuitRegistry::new();
        for ep in ["profile-a", "profile-b"] {
            for _ in 0..5 {
                registry.record_failure(&format!("model:{ep}"));
            }
        }
        let ladder = FallbackLadder::new(
            "model",
            vec!["profile-a".to_string(), "profile-b".to_string()],
        );
        assert_eq!(ladder.next_available(&registry), None);
    }

    #[test]
    fn fallback_ladder_returns_first_when_healthy() {
        let registry = CircuitRegistry::new();
        let ladder = FallbackLadder::new(
            "model",
            vec!["profile-a".to_string(), "profile-b".to_string()],
        );
        assert_eq!(ladder.next_available(&registry), Some("profile-a"));
    }
}
