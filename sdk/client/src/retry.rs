//! Bounded retry with injectable timing.
//!
//! Every sleep-and-poll loop in the engine goes through [`RetryPolicy::run`],
//! so tests can shrink the interval to milliseconds.

use std::future::Future;
use std::time::Duration;

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same interval between every attempt.
    Fixed,
    /// Interval doubles after each attempt, capped at `max`.
    Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

/// Result of one attempt.
pub enum Attempt<T, E> {
    Done(T),
    Retry(E),
}

/// All attempts were used without a `Done`.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Single attempt, no sleeping.
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay after the given 1-based attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max } => {
                let shift = attempt.saturating_sub(1).min(16);
                self.interval.saturating_mul(1 << shift).min(max)
            }
        }
    }

    /// Run `op` until it reports `Done` or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number. No sleep follows the last
    /// attempt.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(last) => {
                    if attempt >= max_attempts {
                        return Err(Exhausted {
                            attempts: attempt,
                            last,
                        });
                    }
                    let delay = self.delay_after(attempt);
                    debug!("{label}: attempt {attempt}/{max_attempts} not done, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
