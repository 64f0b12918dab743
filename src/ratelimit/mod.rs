//! In-process fixed-window rate limiting.
//!
//! One [`RateLimiter`] instance is shared per process and injected into the
//! service layer, keyed by `(action, client identifier)`. It is in-memory
//! and best-effort: counts are not shared across independent server
//! processes. Expired windows are swept opportunistically on each check.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Operations left in the current window (0 when denied).
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
}

struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window counter map behind a mutex.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

/// Compose the counter key for an action by a client.
pub fn rate_limit_key(identifier: &str, action: &str) -> String {
    format!("{}:{}", action, identifier)
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one operation against `key`, allowing up to `limit` per `window`.
    ///
    /// The first hit of a fresh window always passes and opens the window;
    /// further hits pass until the limit is reached, then are denied until
    /// `reset_at`.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        let now = Utc::now();
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        windows.retain(|_, w| w.reset_at > now);

        match windows.get_mut(key) {
            None => {
                let reset_at = now + window;
                windows.insert(key.to_string(), Window { count: 1, reset_at });
                RateDecision { allowed: true, remaining: limit.saturating_sub(1), reset_at }
            }
            Some(current) if current.count >= limit => RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: current.reset_at,
            },
            Some(current) => {
                current.count += 1;
                RateDecision {
                    allowed: true,
                    remaining: limit.saturating_sub(current.count),
                    reset_at: current.reset_at,
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new();
        let window = Duration::minutes(1);

        let first = limiter.check("create:1.2.3.4", 3, window);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);

        assert!(limiter.check("create:1.2.3.4", 3, window).allowed);
        let third = limiter.check("create:1.2.3.4", 3, window);
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);

        let fourth = limiter.check("create:1.2.3.4", 3, window);
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_at, third.reset_at);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        let window = Duration::minutes(1);

        assert!(limiter.check("update:a", 1, window).allowed);
        assert!(!limiter.check("update:a", 1, window).allowed);
        assert!(limiter.check("update:b", 1, window).allowed, "other client unaffected");
        assert!(limiter.check("delete:a", 1, window).allowed, "other action unaffected");
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new();
        let window = Duration::milliseconds(40);

        assert!(limiter.check("import:x", 1, window).allowed);
        assert!(!limiter.check("import:x", 1, window).allowed);

        std::thread::sleep(std::time::Duration::from_millis(60));
        assert!(limiter.check("import:x", 1, window).allowed, "fresh window after expiry");
    }

    #[test]
    fn test_key_format() {
        assert_eq!(rate_limit_key("1.2.3.4", "create-lead"), "create-lead:1.2.3.4");
    }
}
