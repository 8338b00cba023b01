//! Bounded, fixed-delay retry used to gate startup on store reachability.

use std::{future::Future, time::Duration};

use super::{ConnectionError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` of zero still makes one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Sleep abstraction so retry timing can be tested without real delays.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt counter for a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Record the start of an attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Delay before the next attempt, or `None` once attempts are spent.
    pub fn on_failure(&self) -> Option<Duration> {
        (self.attempt < self.policy.max_attempts).then_some(self.policy.delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Run `probe` until it succeeds or the policy is exhausted.
///
/// Sleeps only between attempts, never after the last one.
pub async fn connect_with_retry<F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut probe: F,
) -> Result<(), ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let mut state = RetryState::new(policy);
    loop {
        let attempt = state.begin_attempt();
        match probe().await {
            Ok(()) => {
                tracing::info!(attempt, "store connection established");
                return Ok(());
            }
            Err(e) => match state.on_failure() {
                Some(delay) => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts = policy.max_attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        "store probe failed, retrying"
                    );
                    sleeper.sleep(delay).await;
                }
                None => {
                    tracing::error!(error = %e, attempts = state.attempts(), "store probe failed, giving up");
                    return Err(ConnectionError {
                        attempts: state.attempts(),
                        source: e,
                    });
                }
            },
        }
    }
}
