//! Retry / backoff policy.
//!
//! A call moves through `Attempting → Waiting → Attempting → … → Succeeded |
//! Exhausted`. [`RetryPolicy::decide`] is the only place that chooses between
//! waiting and giving up; the execution loop just follows [`RetryState`].

use rand::Rng;
use std::time::Duration;

use crate::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Bounds for retrying transient failures (429, 5xx, network).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap for computed backoff. A server `Retry-After` is not subject to it.
    pub max_delay: Duration,
    /// Longest server-requested wait the client will sleep through. Anything
    /// longer surfaces immediately. `None` (the default) honors any
    /// `Retry-After` the server sends.
    pub max_retry_after: Option<Duration>,
    /// Randomize computed backoff into `[delay/2, delay]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retry_after: None,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Refuse to sleep through a `Retry-After` longer than `limit`.
    pub fn with_max_retry_after(mut self, limit: Duration) -> Self {
        self.max_retry_after = Some(limit);
        self
    }

    pub fn with_jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// Exponential backoff for the wait after `attempt` (1-based):
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = delay / 2;
        let spread = (delay - half).as_millis() as u64;
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// What to do after `attempt` (1-based) failed with `err`.
    ///
    /// `retry_after` is the server's `Retry-After`, if it sent one; it always
    /// beats the computed backoff.
    pub(crate) fn decide(&self, err: &Error, retry_after: Option<Duration>, attempt: u32) -> Decision {
        if !err.is_retryable() || attempt >= self.max_attempts {
            return Decision::Fail;
        }
        match retry_after {
            Some(wait) if self.max_retry_after.map_or(false, |limit| wait > limit) => Decision::Fail,
            Some(wait) => Decision::Retry { delay: wait },
            None => Decision::Retry {
                delay: self.backoff(attempt),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Where a call currently is in its retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Sending attempt number `attempt` (1-based).
    Attempting { attempt: u32 },
    /// Sleeping before attempt `attempt + 1`.
    Waiting { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting { attempt: 1 }
    }

    /// Attempt number this state refers to (1-based).
    pub fn attempt(&self) -> u32 {
        match *self {
            RetryState::Attempting { attempt } | RetryState::Waiting { attempt, .. } => attempt,
            RetryState::Succeeded { attempts } | RetryState::Exhausted { attempts } => attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded { .. } | RetryState::Exhausted { .. })
    }

    pub(crate) fn on_success(self) -> Self {
        match self {
            RetryState::Attempting { attempt } => RetryState::Succeeded { attempts: attempt },
            other => other,
        }
    }

    pub(crate) fn on_failure(self, decision: Decision) -> Self {
        match (self, decision) {
            (RetryState::Attempting { attempt }, Decision::Retry { delay }) => {
                RetryState::Waiting { attempt, delay }
            }
            (RetryState::Attempting { attempt }, Decision::Fail) => {
                RetryState::Exhausted { attempts: attempt }
            }
            (other, _) => other,
        }
    }

    pub(crate) fn on_wake(self) -> Self {
        match self {
            RetryState::Waiting { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }
}
