//! Retry policy and the race-free scheduled retry timer.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pn_domain::config::{RetryConfig, RetryPolicyKind};
use pn_domain::Endpoint;
use rand::Rng;
use tokio::sync::Notify;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure classes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What went wrong with an attempt, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Tls,
    /// Non-2xx HTTP status.
    Http(u16),
    Cancelled,
    MalformedResponse,
    Crypto,
    /// The request was rejected before it left the client.
    Rejected,
}

impl FailureKind {
    /// Only transport failures, 429 and 5xx are worth another attempt.
    pub fn is_retriable(self) -> bool {
        match self {
            FailureKind::Network | FailureKind::Timeout | FailureKind::Tls => true,
            FailureKind::Http(status) => status == 429 || (500..600).contains(&status),
            FailureKind::Cancelled
            | FailureKind::MalformedResponse
            | FailureKind::Crypto
            | FailureKind::Rejected => false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    Linear {
        delay: Duration,
        maximum_retry: u32,
    },
    Exponential {
        minimum_delay: Duration,
        maximum_delay: Duration,
        maximum_retry: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRetryConfig {
    pub policy: RetryPolicy,
    pub excluded_endpoints: Vec<Endpoint>,
}

impl RequestRetryConfig {
    /// `None` when the config disables automatic retry.
    pub fn from_config(cfg: &RetryConfig) -> Option<Self> {
        let maximum_retry = cfg.effective_maximum_retry();
        let policy = match cfg.policy {
            RetryPolicyKind::None => return None,
            RetryPolicyKind::Linear => RetryPolicy::Linear {
                delay: secs(cfg.delay_secs),
                maximum_retry,
            },
            RetryPolicyKind::Exponential => RetryPolicy::Exponential {
                minimum_delay: secs(cfg.minimum_delay_secs),
                maximum_delay: secs(cfg.maximum_delay_secs),
                maximum_retry,
            },
        };
        Some(Self {
            policy,
            excluded_endpoints: cfg.excluded_endpoints.clone(),
        })
    }

    pub fn linear(delay: Duration, maximum_retry: u32) -> Self {
        Self {
            policy: RetryPolicy::Linear {
                delay,
                maximum_retry,
            },
            excluded_endpoints: Vec::new(),
        }
    }

    pub fn exponential(minimum_delay: Duration, maximum_delay: Duration, maximum_retry: u32) -> Self {
        Self {
            policy: RetryPolicy::Exponential {
                minimum_delay,
                maximum_delay,
                maximum_retry,
            },
            excluded_endpoints: Vec::new(),
        }
    }

    pub fn is_excluded(&self, endpoint: Endpoint) -> bool {
        self.excluded_endpoints.contains(&endpoint)
    }

    pub fn maximum_retry(&self) -> u32 {
        match self.policy {
            RetryPolicy::Linear { maximum_retry, .. }
            | RetryPolicy::Exponential { maximum_retry, .. } => maximum_retry,
        }
    }

    /// Delay before retry number `attempt + 1`, or `None` to give up.
    ///
    /// `attempt` counts retries already made (0 after the first failure).
    pub fn retry_delay(&self, endpoint: Endpoint, attempt: u32, failure: FailureKind) -> Option<Duration> {
        if self.is_excluded(endpoint) || !failure.is_retriable() || attempt >= self.maximum_retry() {
            return None;
        }
        Some(self.base_delay(attempt) + jitter())
    }

    /// Delay without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        match self.policy {
            RetryPolicy::Linear { delay, .. } => delay,
            RetryPolicy::Exponential {
                minimum_delay,
                maximum_delay,
                ..
            } => {
                let factor = 2u32.saturating_pow(attempt.min(31));
                minimum_delay.saturating_mul(factor).min(maximum_delay.max(minimum_delay))
            }
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(if value.is_finite() { value.max(0.0) } else { 0.0 })
}

/// Uniform jitter in `[0, 1)` seconds.
fn jitter() -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scheduled retry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Fired,
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    notify: Notify,
    delay: Duration,
}

/// A cancellable delay with exactly one outcome.
///
/// State moves `Pending → Fired` (timer or [`fire_now`](Self::fire_now))
/// or `Pending → Cancelled` ([`cancel`](Self::cancel)), through a single
/// compare-and-swap, so a cancel racing the timer either wins completely
/// or fails.  Clones share the same state.
#[derive(Debug, Clone)]
pub struct ScheduledRetry {
    inner: Arc<Inner>,
}

impl ScheduledRetry {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(PENDING),
                notify: Notify::new(),
                delay,
            }),
        }
    }

    fn transition(&self, to: u8) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.inner.notify.notify_waiters();
        }
        won
    }

    /// Cancel if still pending.  Returns whether this call decided the
    /// outcome.
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    /// Fire immediately if still pending.
    pub fn fire_now(&self) -> bool {
        self.transition(FIRED)
    }

    pub fn outcome(&self) -> Option<RetryOutcome> {
        match self.inner.state.load(Ordering::Acquire) {
            FIRED => Some(RetryOutcome::Fired),
            CANCELLED => Some(RetryOutcome::Cancelled),
            _ => None,
        }
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> RetryOutcome {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(outcome) = self.outcome() {
            return outcome;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.inner.delay) => {
                self.transition(FIRED);
            }
            _ = &mut notified => {}
        }
        self.outcome().unwrap_or(RetryOutcome::Cancelled)
    }
}
