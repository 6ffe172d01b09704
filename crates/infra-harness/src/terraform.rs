// crates/infra-harness/src/terraform.rs
// ============================================================================
// Module: Terraform Driver
// Description: Blocking wrapper over the terraform CLI lifecycle.
// Purpose: Run init/validate/plan/apply/destroy/output with bounded retries.
// Dependencies: regex, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The driver is a thin pass-through to the external tool. Each operation
//! builds a [`CommandSpec`], hands it to a [`CommandRunner`], and classifies
//! failures: output matching a configured retryable pattern is retried, and
//! anything else fails immediately.
//!
//! Security posture: sensitive variables travel through `TF_VAR_*`
//! environment entries, never argv, and every captured output is redacted
//! before it reaches an error or event.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod driver;
mod options;
mod runner;
#[cfg(any(test, feature = "testing"))]
mod scripted;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use driver::Terraform;
pub use options::REDACTED;
pub use options::RetryableError;
pub use options::TerraformOptions;
pub use runner::CommandOutput;
pub use runner::CommandRunner;
pub use runner::CommandSpec;
pub use runner::ProcessRunner;
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedRunner;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Provisioning tool failures.
///
/// # Invariants
/// - Captured output is redacted before it is stored in a variant.
#[derive(Debug, Error)]
pub enum TerraformError {
    /// The tool could not be started.
    #[error("failed to start `{command}`: {message}")]
    Spawn {
        /// Redacted command line.
        command: String,
        /// Operating system error.
        message: String,
    },
    /// The tool exited unsuccessfully.
    #[error("`{command}` exited with {}: {output}", exit_label(.exit_code.as_ref()))]
    CommandFailed {
        /// Redacted command line.
        command: String,
        /// Exit code, absent when terminated by a signal.
        exit_code: Option<i32>,
        /// Redacted tail of combined stdout/stderr.
        output: String,
    },
    /// A retryable failure persisted across every attempt.
    #[error("`{command}` failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Redacted command line.
        command: String,
        /// Attempts made.
        attempts: u32,
        /// Failure from the final attempt.
        last: Box<TerraformError>,
    },
    /// The requested output is not present in state.
    #[error("output `{name}` not found")]
    MissingOutput {
        /// Output name.
        name: String,
    },
    /// The output could not be decoded.
    #[error("output `{name}` is invalid: {message}")]
    InvalidOutput {
        /// Output name.
        name: String,
        /// Decode failure.
        message: String,
    },
}

impl TerraformError {
    /// Returns true when the tool itself could not be started.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// Renders an exit code for error messages.
fn exit_label(exit_code: Option<&i32>) -> String {
    exit_code.map_or_else(|| "signal".to_string(), |code| format!("status {code}"))
}
