//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::core_state::CoreState;
use crate::models::enums::Role;

/// Attempts per minute allowed on login/reset endpoints, per email.
pub const AUTH_ATTEMPTS_PER_MINUTE: u32 = 10;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub auth_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            auth_limiter: Arc::new(Mutex::new(RateLimiter::with_limits(
                AUTH_ATTEMPTS_PER_MINUTE,
                AUTH_ATTEMPTS_PER_MINUTE * 60,
            ))),
        }
    }

    /// Count one credential attempt for `email`.
    pub fn check_auth_attempt(&self, email: &str) -> Result<(), crate::api::error::ApiError> {
        use crate::api::error::ApiError;
        let mut limiter = self
            .auth_limiter
            .lock()
            .map_err(|_| ApiError::Internal("auth limiter lock".into()))?;
        limiter
            .check(&format!("email:{email}"))
            .map_err(|retry_after| ApiError::RateLimited { retry_after })
    }
}

// ═══════════════════════════════════════════════════════════
// Auth context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, inserted into request extensions by the auth
/// middleware after the bearer token resolves to a live session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    /// Stored hash of the presented token, used by logout.
    pub token_hash: String,
}

impl AuthContext {
    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-key sliding window
// ═══════════════════════════════════════════════════════════

/// Per-key rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a key is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        // Drop idle keys so the map does not grow without bound
        if self.windows.len() > 10_000 {
            self.windows.retain(|_, hits| {
                hits.last()
                    .is_some_and(|ts| now.duration_since(*ts) < Duration::from_secs(3600))
            });
        }

        let entries = self.windows.entry(key.to_string()).or_default();

        // Clean entries older than 1 hour
        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.check("ip:1").is_ok());
        assert!(limiter.check("ip:1").is_ok());
    }

    #[test]
    fn rate_limiter_rejects_over_per_minute() {
        let mut limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.check("ip:1").is_ok());
        assert!(limiter.check("ip:1").is_ok());
        assert_eq!(limiter.check("ip:1"), Err(60));
    }

    #[test]
    fn rate_limiter_rejects_over_per_hour() {
        let mut limiter = RateLimiter::with_limits(100, 3);
        for _ in 0..3 {
            assert!(limiter.check("ip:1").is_ok());
        }
        assert_eq!(limiter.check("ip:1"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_keys() {
        let mut limiter = RateLimiter::with_limits(1, 1000);
        assert!(limiter.check("ip:1").is_ok());
        assert!(limiter.check("ip:2").is_ok());
        assert_eq!(limiter.check("ip:1"), Err(60));
    }

    #[test]
    fn auth_attempts_limited_per_email() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::with_clients(
            crate::config::Config::for_tests(tmp.path().join("m.db")),
            Arc::new(crate::ai::MockLlmClient::new("")),
            Arc::new(crate::mail::RecordingMailer::new()),
        ));
        let ctx = ApiContext::new(core);
        for _ in 0..AUTH_ATTEMPTS_PER_MINUTE {
            assert!(ctx.check_auth_attempt("a@clinic.test").is_ok());
        }
        assert!(ctx.check_auth_attempt("a@clinic.test").is_err());
        assert!(ctx.check_auth_attempt("b@clinic.test").is_ok());
    }
}
