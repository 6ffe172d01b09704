// crates/infra-harness/src/assertions.rs
// ============================================================================
// Module: Output Assertions
// Description: Expectations over named outputs and plan text.
// Purpose: Poll outputs until they satisfy an expectation or time runs out.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Outputs are fetched and checked inside [`do_with_retry`], so a value that
//! is briefly absent or stale after apply does not fail the run. The
//! expected names are derived from the project name the run passed in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

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
// SECTION: Constants
// ============================================================================

/// Output holding the pipeline name.
pub const OUTPUT_PIPELINE_NAME: &str = "pipeline_name";
/// Output holding the artifact bucket name.
pub const OUTPUT_S3_BUCKET_NAME: &str = "s3_bucket_name";
/// Output holding the build project name.
pub const OUTPUT_CODEBUILD_PROJECT_NAME: &str = "codebuild_project_name";
/// Resource types a plan for the pipeline module must mention.
pub const PLAN_RESOURCE_TYPES: &[&str] =
    &["aws_codepipeline", "aws_s3_bucket", "aws_codebuild_project"];

// ============================================================================
// SECTION: Expected Names
// ============================================================================

/// Expected pipeline name fragment for a project.
#[must_use]
pub fn expected_pipeline_name(project_name: &str) -> String {
    format!("{project_name}-pipeline")
}

/// Expected artifact bucket name prefix for a project.
#[must_use]
pub fn expected_bucket_prefix(project_name: &str) -> String {
    format!("{project_name}-codepipeline-artifacts")
}

/// Expected build project name for a project.
#[must_use]
pub fn expected_codebuild_project(project_name: &str) -> String {
    format!("{project_name}-build")
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Predicate over an output's string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputExpectation {
    /// Value contains the fragment.
    Contains(String),
    /// Value equals the text exactly.
    Equals(String),
    /// Value is non-empty.
    NotEmpty,
}

impl OutputExpectation {
    /// Checks `actual` against the expectation.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::Unmet`] when the value does not satisfy it.
    pub fn check(&self, actual: &str) -> Result<(), AssertionError> {
        let met = match self {
            Self::Contains(fragment) => actual.contains(fragment.as_str()),
            Self::Equals(expected) => actual == expected,
            Self::NotEmpty => !actual.trim().is_empty(),
        };
        if met {
            Ok(())
        } else {
            Err(AssertionError::Unmet {
                expectation: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for OutputExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains(fragment) => write!(f, "contains \"{fragment}\""),
            Self::Equals(expected) => write!(f, "equals \"{expected}\""),
            Self::NotEmpty => f.write_str("is not empty"),
        }
    }
}

/// Assertion failures.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// A value did not satisfy its expectation.
    #[error("expected value that {expectation}, got \"{actual}\"")]
    Unmet {
        /// Rendered expectation.
        expectation: String,
        /// Observed value.
        actual: String,
    },
    /// The output could not be read.
    #[error("output read failed: {0}")]
    Output(#[from] TerraformError),
    /// Polling gave up on an output.
    #[error("output `{name}` never satisfied expectation after {attempts} attempts: {last}")]
    Exhausted {
        /// Output name.
        name: String,
        /// Attempts made.
        attempts: u32,
        /// Failure from the final attempt.
        last: Box<AssertionError>,
    },
    /// Plan text did not mention required resource types.
    #[error("plan is missing resource types: {}", .missing.join(", "))]
    MissingPlanResources {
        /// Resource types absent from the plan.
        missing: Vec<String>,
    },
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Polls output `name` until it satisfies `expectation` and returns the value.
///
/// A tool that cannot be started aborts polling immediately. Every other
/// failure (missing output, unmet expectation, command error) is retried.
///
/// # Errors
///
/// Returns [`AssertionError::Exhausted`] when the policy runs out, or
/// [`AssertionError::Output`] for a non-retryable read failure.
pub fn verify_output<R: CommandRunner>(
    tf: &Terraform<R>,
    name: &str,
    expectation: &OutputExpectation,
    policy: RetryPolicy,
    sink: &dyn EventSink,
) -> Result<String, AssertionError> {
    let description = format!("output {name} {expectation}");
    let result: Result<String, RetryError<AssertionError>> =
        do_with_retry(&description, policy, sink, || {
            let value = tf.output(name).map_err(|err| {
                if err.is_spawn() {
                    AttemptError::Fatal(AssertionError::Output(err))
                } else {
                    AttemptError::Retryable(AssertionError::Output(err))
                }
            })?;
            expectation.check(&value)?;
            Ok(value)
        });
    match result {
        Ok(value) => {
            sink.record(
                &HarnessEvent::new(EventKind::OutputVerified, name, EventOutcome::Ok)
                    .with_run_id(tf.run_id())
                    .with_message(format!("{expectation}: {value}")),
            );
            Ok(value)
        }
        Err(RetryError::Fatal {
            error, ..
        }) => Err(error),
        Err(RetryError::Exhausted {
            attempts,
            last_error,
            ..
        }) => Err(AssertionError::Exhausted {
            name: name.to_string(),
            attempts,
            last: Box::new(last_error),
        }),
    }
}

/// Returns the identifiers in `expected` that do not appear in `plan_text`.
#[must_use]
pub fn missing_plan_resources(plan_text: &str, expected: &[&str]) -> Vec<String> {
    expected
        .iter()
        .filter(|identifier| !plan_text.contains(**identifier))
        .map(|identifier| (*identifier).to_string())
        .collect()
}

/// Asserts that `plan_text` mentions every identifier in `expected`.
///
/// # Errors
///
/// Returns [`AssertionError::MissingPlanResources`] listing the absent ones.
pub fn assert_plan_contains(plan_text: &str, expected: &[&str]) -> Result<(), AssertionError> {
    let missing = missing_plan_resources(plan_text, expected);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AssertionError::MissingPlanResources {
            missing,
        })
    }
}
