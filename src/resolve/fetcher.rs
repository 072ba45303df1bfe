//! Retry with exponential backoff for throttled external lookups.
//!
//! Every external call of the pipeline goes through [`RateLimitedFetcher::fetch`];
//! callers never sleep-and-retry on their own.

use std::time::Duration;

use crate::{config::RetryConfig, interrupt::Interrupt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(15),
            max_delay: Duration::from_secs(5 * 60),
            max_attempts: 6,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(conf: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(conf.initial_backoff_secs),
            max_delay: Duration::from_secs(conf.max_backoff_secs),
            max_attempts: conf.max_attempts,
        }
    }
}

/// Blocking wait used for backoff and pacing
pub trait Sleeper {
    fn sleep(&mut self, delay: Duration);

    /// once true, pending retries are abandoned
    fn interrupted(&self) -> bool {
        false
    }
}

/// Sleeps on the current thread, waking early when the run is interrupted
pub struct ThreadSleeper {
    interrupt: Interrupt,
}

impl ThreadSleeper {
    const SLICE: Duration = Duration::from_millis(100);

    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, delay: Duration) {
        let mut left = delay;
        while !left.is_zero() && !self.interrupt.is_set() {
            let step = left.min(Self::SLICE);
            std::thread::sleep(step);
            left -= step;
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.is_set()
    }
}

pub struct RateLimitedFetcher<S> {
    policy: RetryPolicy,
    sleeper: S,
}

impl<S: Sleeper> RateLimitedFetcher<S> {
    pub fn new(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Fixed pause between consecutive lookups
    pub fn pause(&mut self, delay: Duration) {
        if !delay.is_zero() {
            self.sleeper.sleep(delay);
        }
    }

    pub fn interrupted(&self) -> bool {
        self.sleeper.interrupted()
    }

    /// Runs `operation`, retrying while `is_rate_limited` classifies its failure.
    ///
    /// Each call starts with a fresh attempt budget. Any other failure, or the
    /// last allowed attempt failing, is returned unchanged.
    pub fn fetch<T, E, F, P>(&mut self, mut operation: F, is_rate_limited: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_delay.min(self.policy.max_delay);
        let mut attempt = 1u32;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err)
                    if attempt < max_attempts
                        && is_rate_limited(&err)
                        && !self.sleeper.interrupted() =>
                {
                    log::warn!(
                        "rate limited (attempt {attempt}/{max_attempts}): {err}, sleeping {}s",
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay);
                    delay = delay.saturating_mul(2).min(self.policy.max_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
