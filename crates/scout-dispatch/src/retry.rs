//! Bounded retry with exponential backoff

use crate::config::RetryConfig;
use crate::error::DispatchError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Largest fraction of a delay that jitter may remove
const MAX_JITTER: f64 = 0.25;

/// Result of one attempt as seen by an observer
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    /// The operation returned a value
    Succeeded,
    /// Retryable failure, another attempt follows after the event's delay
    Retrying(&'a DispatchError),
    /// Final failure: fatal, or the last permitted attempt
    Failed(&'a DispatchError),
}

/// Notification emitted after every attempt
#[derive(Debug, Clone, Copy)]
pub struct AttemptEvent<'a> {
    /// Label of the retried operation, e.g. `"search"`
    pub operation: &'a str,
    /// 1-based attempt number
    pub attempt: u32,
    /// What happened
    pub outcome: AttemptOutcome<'a>,
    /// Backoff before the next attempt, if one follows
    pub delay: Option<Duration>,
    /// Error that triggered this attempt's retry, `None` on the first attempt
    pub previous_error: Option<&'a DispatchError>,
}

/// Receives every [`AttemptEvent`]
pub trait RetryObserver: Send + Sync {
    /// Called once per attempt, after it completes
    fn on_attempt(&self, event: &AttemptEvent<'_>);
}

/// Observer that reports attempts through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        match event.outcome {
            AttemptOutcome::Succeeded => {
                debug!("{} succeeded on attempt {}", event.operation, event.attempt)
            }
            AttemptOutcome::Retrying(err) => warn!(
                "{} attempt {} failed ({}), retrying in {:?}",
                event.operation,
                event.attempt,
                err,
                event.delay.unwrap_or_default()
            ),
            AttemptOutcome::Failed(err) => warn!(
                "{} failed on attempt {}: {}",
                event.operation, event.attempt, err
            ),
        }
    }
}

/// Loop bookkeeping for a single `execute` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,
    /// Delay scheduled before the next attempt
    pub next_delay: Duration,
    /// Error from the most recent failed attempt
    pub last_error: Option<DispatchError>,
}

/// Outcome of [`RetryPolicy::execute`] together with the attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    /// Final result
    pub result: Result<T, DispatchError>,
    /// Attempts actually issued (0 when cancelled before the first)
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// Discard the attempt count
    pub fn into_result(self) -> Result<T, DispatchError> {
        self.result
    }
}

type Classifier = dyn Fn(&DispatchError) -> bool + Send + Sync;

/// Runs an operation until it succeeds, fails fatally, or runs out of attempts
///
/// Delays grow as `base_delay * backoff_multiplier^(attempt - 1)`, capped at
/// `max_delay`. `QuotaExceeded` failures are stretched by
/// `quota_backoff_factor` before the cap.
///
/// # Examples
///
/// ```
/// use scout_dispatch::{DispatchError, RetryConfig, RetryPolicy};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy = RetryPolicy::new(RetryConfig::no_retry());
/// let cancel = CancellationToken::new();
///
/// let attempted = policy
///     .execute("lookup", &cancel, |_| async { Ok::<_, DispatchError>(42) })
///     .await;
/// assert_eq!(attempted.result, Ok(42));
/// assert_eq!(attempted.attempts, 1);
/// # }
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<Classifier>,
    observer: Arc<dyn RetryObserver>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a policy classifying errors with [`DispatchError::is_retryable`]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(DispatchError::is_retryable),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Override which errors are retried
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&DispatchError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replace the attempt observer
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Policy parameters
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Backoff after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, error: &DispatchError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let mut secs =
            self.config.base_delay.as_secs_f64() * self.config.backoff_multiplier.powi(exponent);
        if matches!(error.root(), DispatchError::QuotaExceeded(_)) {
            secs *= self.config.quota_backoff_factor;
        }

        let max_secs = self.config.max_delay.as_secs_f64();
        let capped = if secs.is_finite() {
            secs.clamp(0.0, max_secs)
        } else {
            max_secs
        };

        let delay = Duration::from_secs_f64(capped);
        if self.config.jitter {
            delay.mul_f64(1.0 - fastrand::f64() * MAX_JITTER)
        } else {
            delay
        }
    }

    /// Run `op` under this policy
    ///
    /// `op` receives the 1-based attempt number. The token is checked before
    /// every attempt and during backoff; cancellation ends the loop with
    /// [`DispatchError::Cancelled`].
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut state = RetryState::default();

        loop {
            if cancel.is_cancelled() {
                return Attempted {
                    result: Err(DispatchError::Cancelled),
                    attempts: state.attempt,
                };
            }

            state.attempt += 1;
            let attempt = state.attempt;

            let err = match op(attempt).await {
                Ok(value) => {
                    self.notify(operation, &state, AttemptOutcome::Succeeded, None);
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(err) => err,
            };

            if !(self.classifier)(&err) {
                self.notify(operation, &state, AttemptOutcome::Failed(&err), None);
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            if attempt >= self.config.max_attempts {
                self.notify(operation, &state, AttemptOutcome::Failed(&err), None);
                return Attempted {
                    result: Err(DispatchError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    }),
                    attempts: attempt,
                };
            }

            state.next_delay = self.delay_for(attempt, &err);
            self.notify(
                operation,
                &state,
                AttemptOutcome::Retrying(&err),
                Some(state.next_delay),
            );
            state.last_error = Some(err);

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Attempted {
                        result: Err(DispatchError::Cancelled),
                        attempts: attempt,
                    };
                }
                _ = tokio::time::sleep(state.next_delay) => {}
            }
        }
    }

    fn notify(
        &self,
        operation: &str,
        state: &RetryState,
        outcome: AttemptOutcome<'_>,
        delay: Option<Duration>,
    ) {
        self.observer.on_attempt(&AttemptEvent {
            operation,
            attempt: state.attempt,
            outcome,
            delay,
            previous_error: state.last_error.as_ref(),
        });
    }
}
