// crates/infra-harness/src/lifecycle.rs
// ============================================================================
// Module: Teardown Lifecycle
// Description: Guaranteed destroy around a provisioning test body.
// Purpose: Release cloud resources even when the body fails or panics.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`with_teardown`] runs the body under `catch_unwind` and then always runs
//! destroy under the teardown retry policy. A panic is recorded, teardown
//! runs, and the original panic is resumed: a panicking body never passes.
//! A destroy that keeps failing is a leak and fails the run loudly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::fmt::Display;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use thiserror::Error;

use crate::events::EventKind;
use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::retry::AttemptError;
use crate::retry::RetryError;
use crate::retry::RetryPolicy;
use crate::retry::do_with_retry;
use crate::terraform::CommandRunner;
use crate::terraform::Terraform;
use crate::terraform::TerraformError;


// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure of a body wrapped in teardown.
#[derive(Debug, Error)]
pub enum TeardownError<E> {
    /// The body failed; teardown succeeded.
    #[error("{0}")]
    Body(E),
    /// Destroy never succeeded; resources may still exist.
    #[error(
        "teardown leaked resources for project {project} (state {backend_key}) after {attempts} \
         destroy attempts: {destroy_error}"
    )]
    Leaked {
        /// Project name of the leaked run.
        project: String,
        /// Backend key holding the leaked state.
        backend_key: String,
        /// Destroy attempts made.
        attempts: u32,
        /// Failure from the final destroy attempt.
        destroy_error: TerraformError,
        /// Body failure, when the body also failed.
        body_error: Option<E>,
    },
}

impl<E> TeardownError<E> {
    /// Returns true when teardown leaked resources.
    #[must_use]
    pub const fn is_leak(&self) -> bool {
        matches!(self, Self::Leaked { .. })
    }
}

// ============================================================================
// SECTION: Teardown
// ============================================================================

/// Runs `body`, then destroys everything `tf` provisioned.
///
/// # Errors
///
/// Returns [`TeardownError::Body`] when the body fails and teardown succeeds,
/// and [`TeardownError::Leaked`] when destroy exhausts `policy`.
///
/// # Panics
///
/// Resumes the body's panic after teardown has run.
pub fn with_teardown<R, T, E, F>(
    tf: &Terraform<R>,
    policy: RetryPolicy,
    sink: &dyn EventSink,
    body: F,
) -> Result<T, TeardownError<E>>
where
    R: CommandRunner,
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(body));
    if let Err(payload) = &outcome {
        sink.record(
            &HarnessEvent::new(EventKind::TestPanicked, "test body", EventOutcome::Error)
                .with_run_id(tf.run_id())
                .with_message(panic_message(&**payload)),
        );
    }

    let teardown = destroy_with_retry(tf, policy, sink);

    match (outcome, teardown) {
        (Err(payload), _) => panic::resume_unwind(payload),
        (Ok(Ok(value)), Ok(())) => Ok(value),
        (Ok(Err(error)), Ok(())) => Err(TeardownError::Body(error)),
        (Ok(result), Err(leak)) => Err(TeardownError::Leaked {
            project: leak.project,
            backend_key: leak.backend_key,
            attempts: leak.attempts,
            destroy_error: leak.error,
            body_error: result.err(),
        }),
    }
}

/// Details of a destroy that never succeeded.
struct Leak {
    /// Project name of the leaked run.
    project: String,
    /// Backend key holding the leaked state.
    backend_key: String,
    /// Destroy attempts made.
    attempts: u32,
    /// Failure from the final destroy attempt.
    error: TerraformError,
}

/// Runs destroy under `policy`, recording teardown events.
fn destroy_with_retry<R: CommandRunner>(
    tf: &Terraform<R>,
    policy: RetryPolicy,
    sink: &dyn EventSink,
) -> Result<(), Leak> {
    let project = tf.options().project_name().unwrap_or("unknown").to_string();
    let backend_key = tf.options().backend_key().unwrap_or("unknown").to_string();
    sink.record(
        &HarnessEvent::new(EventKind::TeardownStarted, "terraform destroy", EventOutcome::Info)
            .with_run_id(tf.run_id())
            .with_message(format!("project {project}")),
    );
    let started = Instant::now();
    let result: Result<String, RetryError<TerraformError>> =
        do_with_retry("terraform destroy", policy, sink, || {
            tf.destroy().map_err(|err| {
                if err.is_spawn() { AttemptError::Fatal(err) } else { AttemptError::Retryable(err) }
            })
        });
    match result {
        Ok(_) => {
            sink.record(
                &HarnessEvent::new(
                    EventKind::TeardownCompleted,
                    "terraform destroy",
                    EventOutcome::Ok,
                )
                .with_run_id(tf.run_id())
                .with_duration(started.elapsed()),
            );
            Ok(())
        }
        Err(err) => {
            let (attempts, error) = match err {
                RetryError::Exhausted {
                    attempts,
                    last_error,
                    ..
                } => (attempts, last_error),
                RetryError::Fatal {
                    error, ..
                } => (1, error),
            };
            sink.record(
                &HarnessEvent::new(
                    EventKind::DestroyExhausted,
                    "terraform destroy",
                    EventOutcome::Error,
                )
                .with_run_id(tf.run_id())
                .with_attempt(attempts)
                .with_duration(started.elapsed())
                .with_message(format!(
                    "resources may have leaked: project {project}, state {backend_key}: {error}"
                )),
            );
            Err(Leak {
                project,
                backend_key,
                attempts,
                error,
            })
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
