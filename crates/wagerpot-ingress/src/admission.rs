//! Admission controller: per-caller continuous token bucket.
//!
//! Every engine entry point is guarded by [`AdmissionController::admit`].
//! Each caller key owns one bucket that refills continuously at
//! `refill_per_second` up to `capacity`; a call consumes one token or is
//! denied with a retry-after hint.
//!
//! ## Locking
//!
//! The key → bucket map is behind a read/write lock that is only written
//! when a new key appears or during an idle sweep. Each bucket carries its
//! own mutex, so callers with different keys never contend on a bucket.
//!
//! ## Eviction
//!
//! Buckets idle for at least the configured TTL *and* refilled to capacity
//! are swept opportunistically (at most once per TTL). A full bucket is
//! indistinguishable from a fresh one, so eviction never changes a decision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use wagerpot_types::{Identity, RateLimitConfig, Result, WagerpotError, constants};

// ---------------------------------------------------------------------------
// RateKey
// ---------------------------------------------------------------------------

/// Who a bucket belongs to.
///
/// Verified admin sessions and user identities get their own budget;
/// everyone else shares a budget per network address. A user holding
/// several sessions still draws from one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    Admin(String),
    User(Identity),
    Address(String),
}

impl RateKey {
    /// Pick the most specific key: admin session, then user identity, then address.
    ///
    /// `admin_session` and `user` must already be vouched for by the session
    /// store. Unverified tokens belong under the address key.
    #[must_use]
    pub fn resolve(admin_session: Option<&str>, user: Option<&Identity>, addr: &str) -> Self {
        if let Some(token) = admin_session.filter(|t| !t.is_empty()) {
            return Self::Admin(token.to_string());
        }
        if let Some(identity) = user {
            return Self::User(identity.clone());
        }
        let addr = addr.trim();
        Self::Address(if addr.is_empty() { "unknown".into() } else { addr.into() })
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin(t) => write!(f, "admin:{t}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Address(a) => write!(f, "ip:{a}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Admission decision
// ---------------------------------------------------------------------------

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny { retry_after_secs: u64 },
}

impl Admission {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert a denial into [`WagerpotError::RateLimited`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny { retry_after_secs } => Err(WagerpotError::RateLimited { retry_after_secs }),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    /// 0 ≤ tokens ≤ capacity.
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(limits: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: f64::from(limits.capacity),
            last_refill: now,
        }
    }

    fn refill(&mut self, limits: &RateLimitConfig, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let capacity = f64::from(limits.capacity);
        self.tokens = (self.tokens + elapsed * limits.refill_per_second).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn take(&mut self, limits: &RateLimitConfig, now: Instant) -> Admission {
        self.refill(limits, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Admission::Allow
        } else {
            let rate = limits
                .refill_per_second
                .max(constants::MIN_REFILL_RATE_DIVISOR);
            let wait = ((1.0 - self.tokens) / rate).ceil().max(1.0);
            Admission::Deny {
                retry_after_secs: wait as u64,
            }
        }
    }

    /// Would this bucket be full if refilled at `now`?
    fn is_full_at(&self, limits: &RateLimitConfig, now: Instant) -> bool {
        let mut refilled = *self;
        refilled.refill(limits, now);
        refilled.tokens >= f64::from(limits.capacity)
    }
}

// ---------------------------------------------------------------------------
// AdmissionController
// ---------------------------------------------------------------------------

/// Per-key token-bucket rate limiter.
///
/// Limits are passed on every call rather than stored, so a configuration
/// change takes effect on the very next request.
pub struct AdmissionController {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    idle_ttl: Duration,
    last_sweep: Mutex<Option<Instant>>,
}

impl AdmissionController {
    /// Create a controller that evicts buckets idle for at least `idle_ttl`.
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            idle_ttl,
            last_sweep: Mutex::new(None),
        }
    }

    /// Consume one token from `key`'s bucket, creating it full if absent.
    ///
    /// Never blocks on other keys and never sleeps.
    pub fn admit(&self, key: &str, limits: &RateLimitConfig, now: Instant) -> Admission {
        self.maybe_sweep(limits, now);

        let bucket = self.bucket_for(key, limits, now);
        let decision = bucket.lock().take(limits, now);

        match decision {
            Admission::Allow => tracing::trace!(key, "Admitted"),
            Admission::Deny { retry_after_secs } => {
                tracing::warn!(key, retry_after_secs, "Rate limit exceeded");
            }
        }
        decision
    }

    fn bucket_for(
        &self,
        key: &str,
        limits: &RateLimitConfig,
        now: Instant,
    ) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }
        let mut map = self.buckets.write();
        Arc::clone(
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(limits, now)))),
        )
    }

    fn maybe_sweep(&self, limits: &RateLimitConfig, now: Instant) {
        let due = {
            let mut last = self.last_sweep.lock();
            match *last {
                Some(at) if now.saturating_duration_since(at) < self.idle_ttl => false,
                Some(_) => {
                    *last = Some(now);
                    true
                }
                None => {
                    *last = Some(now);
                    false
                }
            }
        };
        if due {
            self.sweep_idle(limits, now);
        }
    }

    /// Drop buckets idle for at least the TTL that have refilled to capacity.
    /// Returns the number removed.
    pub fn sweep_idle(&self, limits: &RateLimitConfig, now: Instant) -> usize {
        let mut map = self.buckets.write();
        let before = map.len();
        map.retain(|_, bucket| {
            let b = bucket.lock();
            let idle = now.saturating_duration_since(b.last_refill) >= self.idle_ttl;
            !(idle && b.is_full_at(limits, now))
        });
        let removed = before - map.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = map.len(), "Swept idle rate buckets");
        }
        removed
    }

    /// Number of live buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Current token count for a key, if it has a bucket (not refilled).
    #[must_use]
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.buckets.read().get(key).map(|b| b.lock().tokens)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(Duration::from_secs(constants::DEFAULT_BUCKET_IDLE_TTL_SECS))
    }
}
