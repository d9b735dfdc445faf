//! Sliding-window login rate limiting with timed lockout
//!
//! Protects the shared admin credential from brute force. Failures are
//! tracked per client key (typically the remote IP); once the in-window
//! count reaches the configured maximum the key is locked out for a fixed
//! duration. Expiry is lazy: there is no background sweeper, a lock simply
//! stops mattering once `now` passes it.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Failure history for one client key.
#[derive(Debug, Default)]
struct AttemptEntry {
    /// Instants of recent failures, pruned to the window on each touch
    attempts: Vec<Instant>,
    /// Active lockout, if any; compared lazily against the caller's clock
    locked_until: Option<Instant>,
}

/// Tracks login failures per client and decides whether an attempt may
/// proceed.
///
/// The caller supplies `now` on every call; the limiter never reads the
/// clock itself, which keeps the timing behavior deterministic under test.
/// All methods take `&self` and are safe to call from concurrent request
/// handlers; per-key mutation is serialized by the underlying map.
pub struct LoginRateLimiter {
    max_attempts: usize,
    window: Duration,
    lock_duration: Duration,
    entries: DashMap<String, AttemptEntry>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: usize, window: Duration, lock_duration: Duration) -> Self {
        Self {
            max_attempts,
            window,
            lock_duration,
            entries: DashMap::new(),
        }
    }

    /// Check whether a login attempt for `key` may proceed.
    ///
    /// A key with no failure history is always allowed. An active lock
    /// denies before any pruning happens, so an expired lock is only lifted
    /// on the first check where `now` has passed it. If pruning still
    /// leaves the window at or over the maximum, a fresh lock is taken
    /// right here; hitting the threshold does not require another failure.
    pub fn is_allowed(&self, key: &str, now: Instant) -> bool {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return true;
        };

        if let Some(locked_until) = entry.locked_until {
            if locked_until > now {
                return false;
            }
        }

        let window = self.window;
        entry
            .attempts
            .retain(|t| now.saturating_duration_since(*t) <= window);

        if entry.attempts.len() >= self.max_attempts {
            entry.locked_until = Some(now + self.lock_duration);
            warn!(key, "Login attempts still over threshold, re-locking");
            return false;
        }

        true
    }

    /// Record a failed login attempt for `key`.
    ///
    /// Creates the failure record on first use. If the in-window count
    /// reaches the maximum, the key is locked until `now + lock_duration`.
    pub fn register_failure(&self, key: &str, now: Instant) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        entry.attempts.push(now);

        let window = self.window;
        entry
            .attempts
            .retain(|t| now.saturating_duration_since(*t) <= window);

        if entry.attempts.len() >= self.max_attempts {
            entry.locked_until = Some(now + self.lock_duration);
            warn!(
                key,
                attempts = entry.attempts.len(),
                "Too many failed login attempts, locking out"
            );
        }
    }

    /// Forget all failure history and any lock for `key`.
    ///
    /// Called after a successful login; the next `is_allowed` for this key
    /// is guaranteed to return true.
    pub fn reset(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            debug!(key, "Login attempt history cleared");
        }
    }

    /// Drop records that can no longer influence any decision.
    ///
    /// A record is stale once its lock (if any) has expired and its newest
    /// attempt predates `window + lock_duration`. Distinct keys otherwise
    /// accumulate for the life of the process; the embedding layer decides
    /// when to sweep.
    pub fn evict_stale(&self, now: Instant) {
        let horizon = self.window + self.lock_duration;
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if entry.locked_until.is_some_and(|until| until > now) {
                return true;
            }
            entry
                .attempts
                .iter()
                .any(|t| now.saturating_duration_since(*t) <= horizon)
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted stale login attempt records");
        }
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

impl Default for LoginRateLimiter {
    /// 5 attempts per 60 second window, 5 minute lockout.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60), Duration::from_secs(300))
    }
}
