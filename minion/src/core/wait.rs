//! Bounded wait-then-retry schedule for "has it gone yet?" polling.
//!
//! The runtime's stop call returns before the container is necessarily gone,
//! so absence is polled: one grace period first, then a fixed longer interval,
//! for at most `max_polls` checks.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub grace: Duration,
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for WaitPolicy {
    /// 10s grace, then up to nine more checks one minute apart.
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            interval: Duration::from_secs(60),
            max_polls: 10,
        }
    }
}

impl WaitPolicy {
    /// Delay before each check, in order. Empty when `max_polls` is 0.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_polls).map(move |poll| {
            if poll == 0 {
                self.grace
            } else {
                self.interval
            }
        })
    }

    /// Total time slept if every check fails.
    pub fn budget(&self) -> Duration {
        self.delays().sum()
    }
}
