//! Attempt counting and timed lockout.
//!
//! Both the OTP channel and the staff password channel use this shape. The
//! transition function is pure so that every store backend applies exactly
//! the same rule inside its own atomic update.

use chrono::{DateTime, Duration, Utc};

/// Default number of consecutive failures before a lock is applied.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Default lock duration: 15 minutes.
pub const DEFAULT_LOCK_MINUTES: i64 = 15;

/// Threshold and duration for one lockout counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lock_for: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_for: Duration::minutes(DEFAULT_LOCK_MINUTES),
        }
    }
}

/// Persisted attempt counter plus optional lock expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// True while `lock_until` lies in the future.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// State after one more failed attempt.
    ///
    /// A locked state is returned unchanged. A lock that has already elapsed
    /// starts a fresh count.
    pub fn after_failure(&self, policy: &LockoutPolicy, now: DateTime<Utc>) -> LockoutState {
        if self.is_locked(now) {
            return *self;
        }
        let attempts = match self.lock_until {
            Some(_) => 1,
            None => self.attempts + 1,
        };
        let lock_until = (attempts >= policy.max_attempts).then(|| now + policy.lock_for);
        LockoutState {
            attempts,
            lock_until,
        }
    }

    /// State after a successful verification.
    pub fn cleared() -> LockoutState {
        LockoutState::default()
    }
}
