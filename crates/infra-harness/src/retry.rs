// crates/infra-harness/src/retry.rs
// ============================================================================
// Module: Bounded Retry
// Description: Fixed-attempt, fixed-delay retry for blocking actions.
// Purpose: Tolerate eventual consistency in the remote control plane.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`do_with_retry`] runs an action until it succeeds or the attempt budget is
//! spent. The calling thread sleeps for the policy delay between attempts and
//! never after the last one. Actions can abort early by returning
//! [`AttemptError::Fatal`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::events::EventKind;
use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::HarnessEvent;


// ============================================================================
// SECTION: Types
// ============================================================================

/// Fixed-attempt, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Output polling after apply: 3 attempts, 5s apart.
    #[must_use]
    pub const fn output_check() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    /// Teardown destroy: 3 attempts, 10s apart.
    #[must_use]
    pub const fn destroy() -> Self {
        Self::new(3, Duration::from_secs(10))
    }

    /// Bucket existence: 5 attempts, 10s apart.
    #[must_use]
    pub const fn bucket_exists() -> Self {
        Self::new(5, Duration::from_secs(10))
    }

    /// Bucket versioning lookup: 3 attempts, 5s apart.
    #[must_use]
    pub const fn bucket_versioning() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    /// Effective attempt budget.
    const fn attempts(self) -> u32 {
        if self.max_attempts == 0 { 1 } else { self.max_attempts }
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The action may succeed if retried.
    Retryable(E),
    /// The action cannot succeed; stop immediately.
    Fatal(E),
}

impl<E> From<E> for AttemptError<E> {
    fn from(error: E) -> Self {
        Self::Retryable(error)
    }
}

/// Terminal retry failure.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed.
    #[error("'{description}' unsuccessful after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Action description.
        description: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: E,
    },
    /// An attempt failed with a non-retryable error.
    #[error("'{description}' failed with a non-retryable error: {error}")]
    Fatal {
        /// Action description.
        description: String,
        /// Non-retryable error.
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Returns the underlying error of the last attempt.
    #[must_use]
    pub const fn last_error(&self) -> &E {
        match self {
            Self::Exhausted {
                last_error, ..
            } => last_error,
            Self::Fatal {
                error, ..
            } => error,
        }
    }
}

// ============================================================================
// SECTION: Retry Loop
// ============================================================================

/// Runs `action` until it succeeds or `policy` is exhausted.
///
/// Each failed attempt is recorded as [`EventKind::RetryAttemptFailed`];
/// exhaustion is recorded as [`EventKind::RetryExhausted`].
///
/// # Errors
///
/// Returns [`RetryError::Exhausted`] when every attempt fails, or
/// [`RetryError::Fatal`] when an attempt reports a fatal error.
pub fn do_with_retry<T, E, F>(
    description: &str,
    policy: RetryPolicy,
    sink: &dyn EventSink,
    mut action: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, AttemptError<E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        match action() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(error)) => {
                sink.record(
                    &HarnessEvent::new(EventKind::RetryExhausted, description, EventOutcome::Error)
                        .with_attempt(attempt)
                        .with_message(format!("fatal: {error}")),
                );
                return Err(RetryError::Fatal {
                    description: description.to_string(),
                    error,
                });
            }
            Err(AttemptError::Retryable(error)) => {
                sink.record(
                    &HarnessEvent::new(
                        EventKind::RetryAttemptFailed,
                        description,
                        EventOutcome::Error,
                    )
                    .with_attempt(attempt)
                    .with_message(error.to_string()),
                );
                if attempt >= attempts {
                    sink.record(
                        &HarnessEvent::new(
                            EventKind::RetryExhausted,
                            description,
                            EventOutcome::Error,
                        )
                        .with_attempt(attempt),
                    );
                    return Err(RetryError::Exhausted {
                        description: description.to_string(),
                        attempts: attempt,
                        last_error: error,
                    });
                }
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
}
