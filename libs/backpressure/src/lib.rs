//! Token-bucket admission gate for outbound chat traffic.
//!
//! The bucket is consulted by exactly one consumer (the send loop), so there
//! is no internal locking. Refill is lazy: available tokens are recomputed
//! from elapsed time on every call, which avoids timer drift and keeps the
//! state down to `(available, last_refill)`.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Admission policy: `capacity` tokens, `refill_amount` added back every
/// `refill_period`, clamped at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub capacity: u32,
    pub refill_amount: u32,
    pub refill_period: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        // 20 messages per 30 seconds, the usual chat-verified budget
        Self {
            capacity: 20,
            refill_amount: 20,
            refill_period: Duration::from_secs(30),
        }
    }
}

impl RateLimitPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.capacity == 0 {
            return Err(PolicyError::NonPositive("capacity"));
        }
        if self.refill_amount == 0 {
            return Err(PolicyError::NonPositive("refill_amount"));
        }
        if self.refill_period.is_zero() {
            return Err(PolicyError::NonPositive("refill_period"));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("rate limit {0} must be positive")]
    NonPositive(&'static str),
}

/// Outcome of an admission attempt. `Wait` is advisory: the limiter never
/// blocks, callers decide whether to sleep until `until` or drop the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Wait { until: Instant },
}

#[derive(Debug)]
pub struct TokenBucket {
    policy: RateLimitPolicy,
    available: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket. The policy must already be validated.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            available: policy.capacity,
            last_refill: Instant::now(),
        }
    }

    /// Attempts to take `cost` tokens. On refusal, returns the earliest
    /// instant at which a retry could succeed, computed from the refill
    /// schedule.
    pub fn try_acquire(&mut self, cost: u32) -> Admission {
        self.refill(Instant::now());
        if self.available >= cost {
            self.available -= cost;
            trace!(cost, available = self.available, "token granted");
            return Admission::Granted;
        }

        let deficit = cost - self.available;
        let periods_needed = deficit.div_ceil(self.policy.refill_amount);
        let until = self.last_refill + self.policy.refill_period * periods_needed;
        trace!(cost, available = self.available, "token refused");
        Admission::Wait { until }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed < self.policy.refill_period {
            return;
        }
        let periods = (elapsed.as_nanos() / self.policy.refill_period.as_nanos()) as u32;
        let refill = periods.saturating_mul(self.policy.refill_amount);
        self.available = self
            .available
            .saturating_add(refill)
            .min(self.policy.capacity);
        // advance by whole periods so partial progress is not lost
        self.last_refill += self.policy.refill_period * periods;
    }
}
