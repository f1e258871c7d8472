//! Policy-driven retry with exponential backoff
//!
//! A [`RetryExecutor`] wraps a zero-argument remote call, classifies each
//! failure through [`ErrorClass::of`] and either retries with exponential
//! backoff (transient errors) or propagates immediately (everything else).
//! The wrapped operation must be safe to repeat; the executor does not check.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{codes, Error, RemoteError, Result};

/// Errors that expose a service error code for classification
pub trait ErrorCode {
    fn error_code(&self) -> &str;
}

impl ErrorCode for RemoteError {
    fn error_code(&self) -> &str {
        &self.code
    }
}

/// Immutable retry configuration for one class of remote calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    backoff_factor: f64,
    retryable_error_codes: HashSet<String>,
}

impl RetryPolicy {
    /// Create a validated retry policy
    ///
    /// # Arguments
    /// * `max_retries` - Retries allowed beyond the first call
    /// * `base_delay` - Delay before the first retry (must be non-zero)
    /// * `backoff_factor` - Multiplier applied per retry (must be > 1)
    /// * `retryable_error_codes` - Error codes treated as transient
    pub fn new<I, S>(
        max_retries: u32,
        base_delay: Duration,
        backoff_factor: f64,
        retryable_error_codes: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if base_delay.is_zero() {
            return Err(Error::config("retry base_delay must be greater than zero"));
        }
        if !backoff_factor.is_finite() || backoff_factor <= 1.0 {
            return Err(Error::config(format!(
                "retry backoff_factor must be a finite number > 1, got {}",
                backoff_factor
            )));
        }

        Ok(Self {
            max_retries,
            base_delay,
            backoff_factor,
            retryable_error_codes: retryable_error_codes.into_iter().map(Into::into).collect(),
        })
    }

    /// Policy for control-plane calls (describe / create)
    pub fn control_plane() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            retryable_error_codes: [
                codes::THROTTLING,
                codes::SERVICE_UNAVAILABLE,
                codes::INTERNAL_FAILURE,
                codes::REQUEST_TIMEOUT,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    /// Policy for endpoint invocations
    ///
    /// Quota exhaustion and model/validation errors stay fatal.
    pub fn invocation() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            retryable_error_codes: [
                codes::THROTTLING,
                codes::SERVICE_UNAVAILABLE,
                codes::INTERNAL_FAILURE,
                codes::REQUEST_TIMEOUT,
                codes::MODEL_NOT_READY,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn retryable_error_codes(&self) -> &HashSet<String> {
        &self.retryable_error_codes
    }

    /// Whether an error code is in the retryable set
    pub fn is_retryable(&self, code: &str) -> bool {
        self.retryable_error_codes.contains(code)
    }

    /// Delay slept before call number `attempt` (1-based)
    ///
    /// The first call is never delayed; call `k >= 2` waits
    /// `base_delay * backoff_factor^(k-2)`. Saturates at `Duration::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// How a failed remote call should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; safe to retry under backoff
    Retryable,
    /// Expected outcome of a concurrent caller winning a race ("already exists")
    RacingBenign,
    /// Anything else; propagate immediately
    Fatal,
}

impl ErrorClass {
    /// Classify an error against a policy
    pub fn of<E: ErrorCode + ?Sized>(error: &E, policy: &RetryPolicy) -> Self {
        let code = error.error_code();
        if code == codes::ALREADY_EXISTS {
            ErrorClass::RacingBenign
        } else if policy.is_retryable(code) {
            ErrorClass::Retryable
        } else {
            ErrorClass::Fatal
        }
    }
}

/// Terminal failure of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Retryable error persisted until the retry bound was reached
    Exhausted { attempts: u32, last: E },
    /// Non-retryable error, passed through unchanged
    Fatal(E),
}

impl<E> RetryError<E> {
    /// The underlying error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
            RetryError::Fatal(e) => write!(f, "non-retryable error: {}", e),
        }
    }
}

/// Successful result of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Number of calls made, including the successful one
    pub attempts: u32,
}

/// Wraps remote calls in a retry loop governed by a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    label: String,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            label: "remote call".to_string(),
        }
    }

    /// Name used in log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails fatally, or exhausts the policy
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
    ) -> std::result::Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: ErrorCode + fmt::Display,
    {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut retries = 0u32;

        loop {
            let attempt = retries + 1;
            let err = match operation().await {
                Ok(value) => {
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt,
                    })
                }
                Err(err) => err,
            };

            match ErrorClass::of(&err, &self.policy) {
                ErrorClass::Retryable => {
                    if retries >= self.policy.max_retries {
                        tracing::error!(
                            "{}: retries exhausted (attempt {}/{}): {}",
                            self.label,
                            attempt,
                            max_attempts,
                            err
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    retries += 1;
                    let delay = self.policy.delay_for_attempt(attempt + 1);
                    tracing::warn!(
                        "{}: transient error (attempt {}/{}), retrying in {:?}: {}",
                        self.label,
                        attempt,
                        max_attempts,
                        delay,
                        err
                    );
                    sleep(delay).await;
                }
                class => {
                    tracing::debug!(
                        "{}: {:?} error on attempt {}, not retrying: {}",
                        self.label,
                        class,
                        attempt,
                        err
                    );
                    return Err(RetryError::Fatal(err));
                }
            }
        }
    }
}
