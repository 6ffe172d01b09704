// crates/infra-harness/src/terraform/scripted.rs
// ============================================================================
// Module: Scripted Runner
// Description: In-memory command runner replaying queued responses.
// Purpose: Exercise driver, retry, and teardown flows without the real tool.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Responses are queued per subcommand and consumed in order. A subcommand
//! with an empty queue succeeds with empty stdout. Every invocation is
//! recorded, environment included, so callers can assert on exactly what
//! would have been executed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use super::runner::CommandOutput;
use super::runner::CommandRunner;
use super::runner::CommandSpec;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Queued response for one invocation.
#[derive(Debug, Clone)]
enum Scripted {
    /// Process ran and produced output.
    Output(CommandOutput),
    /// Process could not be started.
    SpawnError(io::ErrorKind),
}

/// Command runner that replays scripted responses.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    /// Pending responses keyed by subcommand.
    script: Mutex<BTreeMap<String, VecDeque<Scripted>>>,
    /// Invocations in execution order.
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds with empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an output for the next invocation of `subcommand`.
    #[must_use]
    pub fn respond(self, subcommand: &str, output: CommandOutput) -> Self {
        self.enqueue(subcommand, Scripted::Output(output));
        self
    }

    /// Queues a successful invocation of `subcommand` printing `stdout`.
    #[must_use]
    pub fn succeed(self, subcommand: &str, stdout: &str) -> Self {
        self.respond(subcommand, CommandOutput::success(stdout))
    }

    /// Queues `times` failed invocations of `subcommand`.
    #[must_use]
    pub fn fail(self, subcommand: &str, times: usize, stderr: &str) -> Self {
        for _ in 0..times {
            self.enqueue(subcommand, Scripted::Output(CommandOutput::failure(1, stderr)));
        }
        self
    }

    /// Queues a start failure for `subcommand`.
    #[must_use]
    pub fn spawn_error(self, subcommand: &str) -> Self {
        self.enqueue(subcommand, Scripted::SpawnError(io::ErrorKind::NotFound));
        self
    }

    /// Recorded invocations in execution order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Recorded subcommands in execution order.
    #[must_use]
    pub fn subcommands(&self) -> Vec<String> {
        self.calls().iter().map(|call| call.subcommand().to_string()).collect()
    }

    /// Number of recorded invocations of `subcommand`.
    #[must_use]
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls().iter().filter(|call| call.subcommand() == subcommand).count()
    }

    /// Appends a response to the queue for `subcommand`.
    fn enqueue(&self, subcommand: &str, response: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.entry(subcommand.to_string()).or_default().push_back(response);
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.get_mut(spec.subcommand()).and_then(VecDeque::pop_front));
        match next {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnError(kind)) => {
                Err(io::Error::new(kind, format!("{}: not found", spec.program)))
            }
            None => Ok(CommandOutput::success("")),
        }
    }
}
