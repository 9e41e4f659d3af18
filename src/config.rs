use jsonwebtoken::Algorithm;
use std::time::Duration;

/// Configuration for the access-control services.
///
/// `token_expiration` is the single source of truth for token lifetime: both
/// the signed `exp` claim and the session record's expiry are derived from it.
#[derive(Clone)]
pub struct AuthConfig {
    /// Access-token lifetime in minutes.
    pub token_expiration_mins: u64,
    /// Session-id entropy in bytes (hex-encoded, so ids are twice as long).
    pub token_length: usize,
    /// Signing algorithm for access tokens. HMAC variants only.
    pub token_algorithm: Algorithm,
    /// Shared secret for token signing and verification.
    pub token_secret: Vec<u8>,
    /// How often callers should sweep expired sessions from the cache.
    pub cache_cleanup_interval: Duration,
    /// Fixed rate-limit window length.
    pub rate_limit_window: Duration,
    /// Maximum attempts allowed per identifier within one window.
    pub rate_limit_max_attempts: u32,
    /// Time-to-live for cached per-user role lists.
    pub role_cache_ttl: Duration,
    /// How often callers should sweep expired rate-limit windows.
    pub rate_limit_sweep_interval: Duration,
}

impl AuthConfig {
    /// Creates a configuration with production defaults and the given secret.
    pub fn new(token_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            token_expiration_mins: 30,
            token_length: 32,
            token_algorithm: Algorithm::HS256,
            token_secret: token_secret.into(),
            cache_cleanup_interval: Duration::from_secs(60 * 60),
            rate_limit_window: Duration::from_secs(5 * 60),
            rate_limit_max_attempts: 100,
            role_cache_ttl: Duration::from_secs(5 * 60),
            rate_limit_sweep_interval: Duration::from_secs(60),
        }
    }

    /// Sets the access-token lifetime in minutes.
    pub fn with_token_expiration_mins(mut self, minutes: u64) -> Self {
        self.token_expiration_mins = minutes;
        self
    }

    /// Sets the session-id entropy in bytes.
    pub fn with_token_length(mut self, bytes: usize) -> Self {
        self.token_length = bytes;
        self
    }

    /// Sets the token signing algorithm.
    pub fn with_token_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.token_algorithm = algorithm;
        self
    }

    /// Sets the rate-limit window and attempt ceiling.
    pub fn with_rate_limit(mut self, window: Duration, max_attempts: u32) -> Self {
        self.rate_limit_window = window;
        self.rate_limit_max_attempts = max_attempts;
        self
    }

    /// Sets the per-user role-cache time-to-live.
    pub fn with_role_cache_ttl(mut self, ttl: Duration) -> Self {
        self.role_cache_ttl = ttl;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_expiration_mins", &self.token_expiration_mins)
            .field("token_length", &self.token_length)
            .field("token_algorithm", &self.token_algorithm)
            .field("token_secret", &"<redacted>")
            .field("cache_cleanup_interval", &self.cache_cleanup_interval)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("rate_limit_max_attempts", &self.rate_limit_max_attempts)
            .field("role_cache_ttl", &self.role_cache_ttl)
            .field("rate_limit_sweep_interval", &self.rate_limit_sweep_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_should_match_documented_tunables() {
        let config = AuthConfig::new("secret");
        assert_eq!(config.rate_limit_window, Duration::from_secs(300));
        assert_eq!(config.rate_limit_max_attempts, 100);
        assert_eq!(config.role_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn debug_should_redact_secret() {
        let config = AuthConfig::new("top-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
