// crates/infra-harness/src/terraform/driver.rs
// ============================================================================
// Module: Terraform Lifecycle Driver
// Description: init/validate/plan/apply/destroy/output over a CommandRunner.
// Purpose: Blocking lifecycle calls with retryable-error classification.
// Dependencies: serde_json
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::TerraformError;
use super::options::TerraformOptions;
use super::runner::CommandOutput;
use super::runner::CommandRunner;
use super::runner::CommandSpec;
use super::runner::ProcessRunner;
use crate::events::EventKind;
use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::retry::AttemptError;
use crate::retry::RetryError;
use crate::retry::RetryPolicy;
use crate::retry::do_with_retry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of command output kept in errors.
const OUTPUT_TAIL_CHARS: usize = 2048;

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Blocking provisioning-tool driver.
pub struct Terraform<R: CommandRunner = ProcessRunner> {
    /// Invocation context.
    options: TerraformOptions,
    /// Process execution seam.
    runner: R,
    /// Event destination.
    sink: Arc<dyn EventSink>,
    /// Run identifier attached to events.
    run_id: Option<String>,
}

impl Terraform<ProcessRunner> {
    /// Creates a driver that spawns real processes.
    #[must_use]
    pub fn new(options: TerraformOptions, sink: Arc<dyn EventSink>) -> Self {
        Self::with_runner(options, ProcessRunner, sink)
    }
}

impl<R: CommandRunner> Terraform<R> {
    /// Creates a driver over a custom runner.
    #[must_use]
    pub fn with_runner(options: TerraformOptions, runner: R, sink: Arc<dyn EventSink>) -> Self {
        Self {
            options,
            runner,
            sink,
            run_id: None,
        }
    }

    /// Attaches a run identifier to emitted events.
    #[must_use]
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// Invocation context.
    #[must_use]
    pub const fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// Underlying runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Event destination.
    #[must_use]
    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Run identifier attached to events.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Initializes the working directory against this run's backend key.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError`] when the command fails.
    pub fn init(&self) -> Result<String, TerraformError> {
        let mut args = self.base_args("init");
        args.push("-upgrade=false".to_string());
        args.push("-input=false".to_string());
        args.extend(self.options.backend_args());
        self.run_with_retries(args)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError`] when the command fails.
    pub fn validate(&self) -> Result<String, TerraformError> {
        self.run_with_retries(self.base_args("validate"))
    }

    /// Computes a plan and returns its textual output.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError`] when the command fails.
    pub fn plan(&self) -> Result<String, TerraformError> {
        self.run_mutation("plan", false)
    }

    /// Applies the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError`] when the command fails.
    pub fn apply(&self) -> Result<String, TerraformError> {
        self.run_mutation("apply", true)
    }

    /// Destroys every resource tracked in this run's state.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError`] when the command fails.
    pub fn destroy(&self) -> Result<String, TerraformError> {
        self.run_mutation("destroy", true)
    }

    /// Reads a named output as a string.
    ///
    /// JSON strings are unwrapped. Other JSON values are rendered compactly.
    ///
    /// # Errors
    ///
    /// Returns [`TerraformError::MissingOutput`] when the output is absent or
    /// null, and [`TerraformError::InvalidOutput`] when stdout is not JSON.
    pub fn output(&self, name: &str) -> Result<String, TerraformError> {
        let mut args = self.base_args("output");
        args.push("-json".to_string());
        args.push(name.to_string());
        let stdout = self.run_classified(args, |output| {
            missing_output(name, &output.combined()).then(|| TerraformError::MissingOutput {
                name: name.to_string(),
            })
        })?;
        parse_output(name, &stdout)
    }

    /// Builds the subcommand plus shared flags.
    fn base_args(&self, subcommand: &str) -> Vec<String> {
        let mut args = vec![subcommand.to_string()];
        if self.options.no_color {
            args.push("-no-color".to_string());
        }
        args
    }

    /// Runs plan/apply/destroy with input disabled and variables attached.
    fn run_mutation(&self, subcommand: &str, auto_approve: bool) -> Result<String, TerraformError> {
        let mut args = self.base_args(subcommand);
        args.push("-input=false".to_string());
        if auto_approve {
            args.push("-auto-approve".to_string());
        }
        args.push("-lock=false".to_string());
        args.extend(self.options.var_args());
        self.run_with_retries(args)
    }

    /// Runs a command, retrying failures that match a retryable pattern.
    fn run_with_retries(&self, args: Vec<String>) -> Result<String, TerraformError> {
        self.run_classified(args, |_| None)
    }

    /// Runs a command with an extra hook that can turn a failure into a
    /// specific non-retryable error.
    fn run_classified<F>(&self, args: Vec<String>, classify: F) -> Result<String, TerraformError>
    where
        F: Fn(&CommandOutput) -> Option<TerraformError>,
    {
        let spec = CommandSpec {
            program: self.options.binary.clone(),
            args,
            dir: self.options.dir.clone(),
            env: self.options.command_env(),
        };
        let command = self.options.redact(&spec.command_line());
        let policy = RetryPolicy::new(
            self.options.max_retries.saturating_add(1),
            self.options.time_between_retries,
        );
        let description = format!("terraform {}", spec.subcommand());
        let result: Result<String, RetryError<TerraformError>> =
            do_with_retry(&description, policy, self.sink.as_ref(), || {
                let output = self.run_once(&spec, &command)?;
                if output.succeeded() {
                    return Ok(output.stdout);
                }
                if let Some(error) = classify(&output) {
                    return Err(AttemptError::Fatal(error));
                }
                let combined = output.combined();
                let error = TerraformError::CommandFailed {
                    command: command.clone(),
                    exit_code: output.exit_code,
                    output: tail(&self.options.redact(&combined), OUTPUT_TAIL_CHARS),
                };
                if self.options.retryable_match(&combined).is_some() {
                    Err(AttemptError::Retryable(error))
                } else {
                    Err(AttemptError::Fatal(error))
                }
            });
        result.map_err(|err| match err {
            RetryError::Fatal {
                error, ..
            } => error,
            RetryError::Exhausted {
                attempts,
                last_error,
                ..
            } => TerraformError::RetriesExhausted {
                command: command.clone(),
                attempts,
                last: Box::new(last_error),
            },
        })
    }

    /// Runs a single attempt and records a `command_finished` event.
    fn run_once(
        &self,
        spec: &CommandSpec,
        command: &str,
    ) -> Result<CommandOutput, AttemptError<TerraformError>> {
        let started = Instant::now();
        let result = self.runner.run(spec);
        let elapsed = started.elapsed();
        let (outcome, message) = match &result {
            Ok(output) if output.succeeded() => (EventOutcome::Ok, "exit 0".to_string()),
            Ok(output) => {
                let status = output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |code| format!("exit {code}"));
                (EventOutcome::Error, status)
            }
            Err(err) => (EventOutcome::Error, format!("spawn failed: {err}")),
        };
        self.sink.record(
            &HarnessEvent::new(EventKind::CommandFinished, command, outcome)
                .with_run_id(self.run_id())
                .with_duration(elapsed)
                .with_message(message),
        );
        result.map_err(|err| {
            AttemptError::Fatal(TerraformError::Spawn {
                command: command.to_string(),
                message: err.to_string(),
            })
        })
    }
}

// ============================================================================
// SECTION: Output Parsing
// ============================================================================

/// Returns true when tool output reports that `name` is not in state.
fn missing_output(name: &str, output: &str) -> bool {
    output.contains(&format!("Output \"{name}\" not found"))
        || output.contains("output variable requested could not be found")
}

/// Decodes `output -json` stdout into a string value.
fn parse_output(name: &str, stdout: &str) -> Result<String, TerraformError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(TerraformError::MissingOutput {
            name: name.to_string(),
        });
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|err| {
        TerraformError::InvalidOutput {
            name: name.to_string(),
            message: err.to_string(),
        }
    })?;
    match value {
        Value::Null => Err(TerraformError::MissingOutput {
            name: name.to_string(),
        }),
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}

/// Keeps at most `max_chars` trailing characters of `text`.
fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}
