//! Bounded retries per hopper.
//!
//! A miss increments the active hopper's attempt counter; once the counter
//! reaches `max_attempts` the session escalates and nothing else is actuated.
//! A confirmed drop resets the counter and asks for a fresh baseline after
//! `recalibrate_delay`.

use crate::config::RetryCfg;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Cycle the same hopper again; `attempt` is 1-based.
    Retry { attempt: u32, remaining: u32 },
    /// Attempts exhausted.
    Escalate { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    recalibrate_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryCfg::default())
    }
}

impl From<&RetryCfg> for RetryPolicy {
    fn from(c: &RetryCfg) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            recalibrate_delay: Duration::from_millis(c.recalibrate_delay_ms),
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[inline]
    pub fn recalibrate_delay(&self) -> Duration {
        self.recalibrate_delay
    }

    /// Decide after a miss. `misses` is the attempt counter after incrementing.
    pub fn after_miss(&self, misses: u32) -> RetryDecision {
        if misses >= self.max_attempts {
            RetryDecision::Escalate { attempts: misses }
        } else {
            RetryDecision::Retry {
                attempt: misses + 1,
                remaining: self.max_attempts - misses,
            }
        }
    }
}
