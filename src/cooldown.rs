use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownDecision {
    pub allowed: bool,
    pub remaining: Duration,
}

impl CooldownDecision {
    pub fn allowed() -> Self {
        Self { allowed: true, remaining: Duration::ZERO }
    }

    /// Remaining wait rounded up to whole seconds, never zero while blocked.
    pub fn remaining_secs(&self) -> u64 {
        if self.allowed {
            return 0;
        }
        let secs = self.remaining.as_secs() + u64::from(self.remaining.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// Minimum spacing between successive operations on the same key.
pub trait CooldownLimiter: Send + Sync {
    fn check(&self, key: &str, window: Duration) -> CooldownDecision;

    fn record(&self, key: &str);

    fn check_and_record(&self, key: &str, window: Duration) -> CooldownDecision {
        let decision = self.check(key, window);
        if decision.allowed {
            self.record(key);
        }
        decision
    }
}

const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Single-process limiter. State is lost on restart.
pub struct MemoryCooldown {
    last_seen: Mutex<HashMap<String, Instant>>,
    retention: Duration,
}

impl MemoryCooldown {
    /// `retention` bounds how long idle keys are remembered; keep it above any window in use.
    pub fn new(retention: Duration) -> Self {
        Self { last_seen: Mutex::new(HashMap::new()), retention }
    }

    /// Limiter whose retention never drops a key while `window` still applies to it.
    pub fn for_window(window: Duration) -> Self {
        Self::new(window.max(DEFAULT_RETENTION))
    }

    pub fn tracked_keys(&self) -> usize {
        self.last_seen.lock().len()
    }
}

impl Default for MemoryCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl CooldownLimiter for MemoryCooldown {
    fn check(&self, key: &str, window: Duration) -> CooldownDecision {
        let Some(last) = self.last_seen.lock().get(key).copied() else {
            return CooldownDecision::allowed();
        };
        let elapsed = last.elapsed();
        if elapsed >= window {
            CooldownDecision::allowed()
        } else {
            CooldownDecision { allowed: false, remaining: window - elapsed }
        }
    }

    fn record(&self, key: &str) {
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock();
        last_seen.retain(|_, at| now.duration_since(*at) < self.retention);
        last_seen.insert(key.to_string(), now);
    }

    fn check_and_record(&self, key: &str, window: Duration) -> CooldownDecision {
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock();
        if let Some(last) = last_seen.get(key) {
            let elapsed = now.duration_since(*last);
            if elapsed < window {
                return CooldownDecision { allowed: false, remaining: window - elapsed };
            }
        }
        last_seen.insert(key.to_string(), now);
        CooldownDecision::allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn blocks_inside_the_window_and_reports_remaining() {
        let limiter = MemoryCooldown::default();
        assert!(limiter.check("g1", WINDOW).allowed);
        limiter.record("g1");

        tokio::time::advance(Duration::from_millis(3_500)).await;
        let decision = limiter.check("g1", WINDOW);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Duration::from_millis(6_500));
        assert_eq!(decision.remaining_secs(), 7);

        tokio::time::advance(Duration::from_millis(6_500)).await;
        assert!(limiter.check("g1", WINDOW).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = MemoryCooldown::default();
        limiter.record("g1");
        assert!(!limiter.check("g1", WINDOW).allowed);
        assert!(limiter.check("g2", WINDOW).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn check_without_record_does_not_start_a_window() {
        let limiter = MemoryCooldown::default();
        limiter.check("g1", WINDOW);
        assert!(limiter.check("g1", WINDOW).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_record_is_one_step() {
        let limiter = MemoryCooldown::default();
        assert!(limiter.check_and_record("g1", WINDOW).allowed);
        let second = limiter.check_and_record("g1", WINDOW);
        assert!(!second.allowed);
        assert_eq!(second.remaining_secs(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_keys_are_forgotten() {
        let limiter = MemoryCooldown::new(Duration::from_secs(60));
        limiter.record("old");
        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.record("new");
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn long_windows_outlive_the_default_retention() {
        let window = Duration::from_secs(2 * 3600);
        let limiter = MemoryCooldown::for_window(window);
        limiter.record("g1");

        tokio::time::advance(Duration::from_secs(3601)).await;
        limiter.record("g2");

        let decision = limiter.check("g1", window);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_secs(), 3599);
    }

    #[test]
    fn short_windows_keep_the_default_retention() {
        assert_eq!(MemoryCooldown::for_window(WINDOW).retention, DEFAULT_RETENTION);
    }
}
