//! Bounded polling for asynchronous provider searches

use crate::TravelError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_POLL_ATTEMPTS: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How many times to poll and how long to wait before each attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Abstracts waiting so tests can poll without real delays
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    /// Every attempt came back empty
    Exhausted { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }
}

/// Call `fetch` until it yields `Some`, sleeping `policy.interval` before
/// every attempt. A fetch error ends polling immediately.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    mut fetch: F,
) -> Result<PollOutcome<T>, TravelError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, TravelError>>,
{
    for attempt in 1..=policy.max_attempts {
        sleeper.sleep(policy.interval).await;
        if let Some(value) = fetch(attempt).await? {
            debug!(attempt = attempt, "Poll produced a result");
            return Ok(PollOutcome::Ready(value));
        }
        debug!(attempt = attempt, max_attempts = policy.max_attempts, "Poll returned nothing yet");
    }
    Ok(PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    })
}
