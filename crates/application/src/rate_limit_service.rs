use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use shelfguard_core::AppResult;

/// A fixed ceiling on attempts within a rolling window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    /// Maximum attempts allowed within `window_seconds`.
    pub max_attempts: u32,
    /// Width of the rolling window, in seconds.
    pub window_seconds: i64,
}

impl RateLimitRule {
    /// Creates a new rule.
    #[must_use]
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self { max_attempts, window_seconds }
    }
}

/// A single recorded attempt against a rate-limited key.
#[derive(Debug, Clone, Copy)]
pub struct AttemptInfo {
    /// When the attempt was recorded.
    pub at: DateTime<Utc>,
}

/// Storage port for attempt history, keyed by an opaque caller-defined
/// string (e.g. `"login:{ip}"` or `"backup-code:{user_id}"`).
///
/// The in-process implementation below is sufficient for a single-node
/// deployment; a multi-node deployment would back this with a shared store
/// instead, without changing [`RateLimitService`]'s API.
pub trait RateLimitRepository: Send + Sync {
    /// Appends an attempt for `key` at `now`.
    fn record(&self, key: &str, now: DateTime<Utc>);

    /// Returns every attempt for `key` recorded at or after `since`,
    /// pruning anything older in the process.
    fn attempts_since(&self, key: &str, since: DateTime<Utc>) -> Vec<AttemptInfo>;
}

/// Sliding-window rate limiting for sensitive, KDF-bound, or
/// enumeration-sensitive endpoints (login, backup-code verification,
/// magic-link requests).
#[derive(Clone)]
pub struct RateLimitService {
    repository: std::sync::Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new service over the given repository.
    #[must_use]
    pub fn new(repository: std::sync::Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Checks whether `key` is currently within `rule`, without recording
    /// anything.
    pub fn check(&self, key: &str, rule: RateLimitRule, now: DateTime<Utc>) -> AppResult<bool> {
        let since = now - chrono::Duration::seconds(rule.window_seconds);
        let attempts = self.repository.attempts_since(key, since);
        Ok((attempts.len() as u32) < rule.max_attempts)
    }

    /// Records an attempt for `key` and reports whether the caller remains
    /// within `rule` afterward.
    pub fn record_attempt(&self, key: &str, rule: RateLimitRule, now: DateTime<Utc>) -> AppResult<bool> {
        self.repository.record(key, now);
        self.check(key, rule, now)
    }
}

/// In-process, single-node attempt ledger.
#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    attempts: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl RateLimitRepository for InMemoryRateLimitRepository {
    fn record(&self, key: &str, now: DateTime<Utc>) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|poison| poison.into_inner());
        attempts.entry(key.to_string()).or_default().push(now);
    }

    fn attempts_since(&self, key: &str, since: DateTime<Utc>) -> Vec<AttemptInfo> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|poison| poison.into_inner());
        let Some(history) = attempts.get_mut(key) else {
            return Vec::new();
        };
        history.retain(|at| *at >= since);
        history.iter().map(|at| AttemptInfo { at: *at }).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn blocks_once_rule_is_exceeded() {
        let repository = Arc::new(InMemoryRateLimitRepository::default());
        let service = RateLimitService::new(repository);
        let rule = RateLimitRule::new(3, 60);
        let now = Utc::now();

        assert!(service.record_attempt("login:1.2.3.4", rule, now).unwrap_or(false));
        assert!(service.record_attempt("login:1.2.3.4", rule, now).unwrap_or(false));
        assert!(!service.record_attempt("login:1.2.3.4", rule, now).unwrap_or(true));
    }

    #[test]
    fn attempts_outside_the_window_are_pruned() {
        let repository = Arc::new(InMemoryRateLimitRepository::default());
        let service = RateLimitService::new(repository);
        let rule = RateLimitRule::new(1, 60);
        let now = Utc::now();

        assert!(service.record_attempt("k", rule, now).unwrap_or(false));
        let later = now + chrono::Duration::seconds(61);
        assert!(service.record_attempt("k", rule, later).unwrap_or(false));
    }
}
