use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window attempt counter guarding brute-force-prone endpoints.
///
/// This is advisory backpressure, not a hard security control: it only
/// signals the caller to reject a specific request. Callers should run
/// [`sweep`] on the interval given by
/// [`AuthConfig::rate_limit_sweep_interval`] to bound memory.
///
/// [`sweep`]: RateLimiter::sweep
/// [`AuthConfig::rate_limit_sweep_interval`]: crate::AuthConfig::rate_limit_sweep_interval
#[derive(Debug)]
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Window>>,
    window: Duration,
    max_attempts: u32,
}

#[derive(Debug)]
struct Window {
    count: u32,
    first_attempt: Instant,
}

impl RateLimiter {
    /// Creates a limiter with the given window length and attempt ceiling.
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            window,
            max_attempts,
        }
    }

    /// Records an attempt for `identifier` and returns whether it is allowed.
    ///
    /// The first attempt opens a window at count 1. Within a window each
    /// allowed call increments the count; once the ceiling is reached further
    /// calls are denied without incrementing. A stale window resets to a
    /// fresh count of 1.
    pub fn check_limit(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.attempts.lock().expect("poisoned lock");

        let Some(window) = guard.get_mut(identifier) else {
            guard.insert(
                identifier.to_string(),
                Window {
                    count: 1,
                    first_attempt: now,
                },
            );
            return true;
        };

        if now.duration_since(window.first_attempt) > self.window {
            window.count = 1;
            window.first_attempt = now;
            return true;
        }

        if window.count >= self.max_attempts {
            tracing::warn!(identifier, "rate limit exceeded");
            return false;
        }

        window.count += 1;
        true
    }

    /// Drops fully-expired windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.attempts
            .lock()
            .expect("poisoned lock")
            .retain(|_, window| now.duration_since(window.first_attempt) <= self.window);
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        self.attempts.lock().expect("poisoned lock").len()
    }
}
