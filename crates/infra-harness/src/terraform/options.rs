// crates/infra-harness/src/terraform/options.rs
// ============================================================================
// Module: Terraform Options
// Description: Working directory, variables, backend, and retry settings.
// Purpose: Describe one tool invocation context without leaking secrets.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! [`TerraformOptions`] is the full invocation context for the driver.
//! Variables named in `sensitive_vars` are exported as `TF_VAR_<name>` and
//! replaced by [`REDACTED`] in any text produced by [`TerraformOptions::redact`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::ConfigError;
use crate::config::DEFAULT_TERRAFORM_BIN;
use crate::config::TerraformSettings;
use crate::run::BACKEND_KEY;
use crate::run::RunConfig;
use crate::run::SENSITIVE_VARS;
use crate::run::VAR_PROJECT_NAME;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Replacement text for secret values.
pub const REDACTED: &str = "***";
/// Default retry count for tool commands (attempts beyond the first).
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay between tool command retries.
const DEFAULT_TIME_BETWEEN_RETRIES: Duration = Duration::from_secs(5);

/// Well-known transient tool failures.
const DEFAULT_RETRYABLE_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)error installing provider", "Failed to install provider due to transient network error"),
    (
        r"(?i)failed to query available provider packages",
        "Failed to query provider registry due to transient network error",
    ),
    (r"(?i)could not query provider registry", "Provider registry unreachable"),
    (r"(?i)registry service is unreachable", "Provider registry unreachable"),
    (r"(?i)timeout while waiting for plugin to start", "Provider plugin start timed out"),
    (r"(?i)timed out waiting for server handshake", "Provider plugin handshake timed out"),
    (r"(?i)tls handshake timeout", "TLS handshake timed out"),
    (r"(?i)connection reset by peer", "Connection reset by remote endpoint"),
    (r"(?i)(throttling|rate exceeded|too many requests)", "Cloud API throttled the request"),
    (r"(?i)error acquiring the state lock", "State lock held by another run"),
];

/// Compiled default retryable patterns.
static DEFAULT_RETRYABLE_ERRORS: LazyLock<Vec<RetryableError>> = LazyLock::new(|| {
    DEFAULT_RETRYABLE_PATTERNS
        .iter()
        .filter_map(|(pattern, description)| RetryableError::new(pattern, description).ok())
        .collect()
});

// ============================================================================
// SECTION: Types
// ============================================================================

/// Failure pattern that marks a tool command as retryable.
#[derive(Debug, Clone)]
pub struct RetryableError {
    /// Pattern matched against combined command output.
    pattern: Regex,
    /// Human-readable description logged on retry.
    description: String,
}

impl RetryableError {
    /// Compiles a retryable pattern.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when the pattern is invalid.
    pub fn new(pattern: &str, description: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            description: description.to_string(),
        })
    }

    /// Pattern source text.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Description logged when the pattern matches.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Invocation context for the provisioning tool.
///
/// # Invariants
/// - `Debug` output never contains sensitive variable values.
#[derive(Clone)]
pub struct TerraformOptions {
    /// Directory containing the root module.
    pub dir: PathBuf,
    /// Tool binary name or path.
    pub binary: String,
    /// Input variables.
    pub vars: BTreeMap<String, String>,
    /// Variable names passed through the environment and redacted.
    pub sensitive_vars: BTreeSet<String>,
    /// Backend configuration passed to init.
    pub backend_config: BTreeMap<String, String>,
    /// Patterns that mark a failed command as retryable.
    pub retryable_errors: Vec<RetryableError>,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Delay between retries.
    pub time_between_retries: Duration,
    /// Extra environment entries for every command.
    pub env: BTreeMap<String, String>,
    /// Adds `-no-color` to every command.
    pub no_color: bool,
}

impl TerraformOptions {
    /// Creates options for a module directory with no variables and no retries.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            binary: DEFAULT_TERRAFORM_BIN.to_string(),
            vars: BTreeMap::new(),
            sensitive_vars: BTreeSet::new(),
            backend_config: BTreeMap::new(),
            retryable_errors: Vec::new(),
            max_retries: 0,
            time_between_retries: Duration::ZERO,
            env: BTreeMap::new(),
            no_color: true,
        }
    }

    /// Creates options carrying a run's variables and backend key.
    #[must_use]
    pub fn for_run(dir: impl Into<PathBuf>, run: &RunConfig) -> Self {
        let mut options = Self::new(dir);
        options.vars = run.vars();
        options.sensitive_vars = SENSITIVE_VARS.iter().map(|name| (*name).to_string()).collect();
        options.backend_config = run.backend_config();
        options
    }

    /// Sets the tool binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the retry budget for retryable failures.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, time_between_retries: Duration) -> Self {
        self.max_retries = max_retries;
        self.time_between_retries = time_between_retries;
        self
    }

    /// Adds a retryable error pattern.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when the pattern is invalid.
    pub fn with_retryable_error(
        mut self,
        pattern: &str,
        description: &str,
    ) -> Result<Self, regex::Error> {
        self.retryable_errors.push(RetryableError::new(pattern, description)?);
        Ok(self)
    }

    /// Merges the well-known transient failure patterns and the default
    /// retry budget (3 retries, 5s apart) when none is configured.
    #[must_use]
    pub fn with_default_retryable_errors(mut self) -> Self {
        for default in DEFAULT_RETRYABLE_ERRORS.iter() {
            if !self.retryable_errors.iter().any(|known| known.pattern() == default.pattern()) {
                self.retryable_errors.push(default.clone());
            }
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
            self.time_between_retries = DEFAULT_TIME_BETWEEN_RETRIES;
        }
        self
    }

    /// Applies tool settings: binary override, retry budget, and patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a configured pattern is invalid.
    pub fn with_settings(mut self, settings: &TerraformSettings) -> Result<Self, ConfigError> {
        if let Some(binary) = &settings.binary {
            self.binary.clone_from(binary);
        }
        self.max_retries = settings.max_retries;
        self.time_between_retries = settings.time_between_retries();
        for (pattern, description) in &settings.retryable_errors {
            self.retryable_errors.push(RetryableError::new(pattern, description).map_err(
                |err| ConfigError::Invalid(format!("retryable error pattern {pattern}: {err}")),
            )?);
        }
        if settings.include_default_retryable_errors {
            let (max_retries, delay) = (self.max_retries, self.time_between_retries);
            self = self.with_default_retryable_errors();
            self.max_retries = max_retries;
            self.time_between_retries = delay;
        }
        Ok(self)
    }

    /// Toggles `-no-color`.
    #[must_use]
    pub const fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Module directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Project name variable, when set.
    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.vars.get(VAR_PROJECT_NAME).map(String::as_str)
    }

    /// Backend state key, when set.
    #[must_use]
    pub fn backend_key(&self) -> Option<&str> {
        self.backend_config.get(BACKEND_KEY).map(String::as_str)
    }

    /// Returns the description of the first retryable pattern matching `output`.
    #[must_use]
    pub fn retryable_match(&self, output: &str) -> Option<&str> {
        self.retryable_errors
            .iter()
            .find(|retryable| retryable.pattern.is_match(output))
            .map(RetryableError::description)
    }

    /// Builds `-var name=value` arguments for non-sensitive variables.
    #[must_use]
    pub fn var_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (name, value) in &self.vars {
            if self.sensitive_vars.contains(name) {
                continue;
            }
            args.push("-var".to_string());
            args.push(format!("{name}={value}"));
        }
        args
    }

    /// Builds `-backend-config=key=value` arguments.
    #[must_use]
    pub fn backend_args(&self) -> Vec<String> {
        self.backend_config
            .iter()
            .map(|(key, value)| format!("-backend-config={key}={value}"))
            .collect()
    }

    /// Environment entries for every command, including sensitive variables.
    #[must_use]
    pub fn command_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("TF_IN_AUTOMATION".to_string(), "1".to_string()),
            ("TF_INPUT".to_string(), "0".to_string()),
        ];
        env.extend(self.env.iter().map(|(key, value)| (key.clone(), value.clone())));
        for (name, value) in &self.vars {
            if self.sensitive_vars.contains(name) {
                env.push((format!("TF_VAR_{name}"), value.clone()));
            }
        }
        env
    }

    /// Replaces every non-empty sensitive value in `text` with [`REDACTED`].
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for name in &self.sensitive_vars {
            if let Some(value) = self.vars.get(name)
                && !value.is_empty()
            {
                redacted = redacted.replace(value.as_str(), REDACTED);
            }
        }
        redacted
    }
}

impl fmt::Debug for TerraformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars: BTreeMap<&str, &str> = self
            .vars
            .iter()
            .map(|(name, value)| {
                let shown =
                    if self.sensitive_vars.contains(name) { REDACTED } else { value.as_str() };
                (name.as_str(), shown)
            })
            .collect();
        f.debug_struct("TerraformOptions")
            .field("dir", &self.dir)
            .field("binary", &self.binary)
            .field("vars", &vars)
            .field("sensitive_vars", &self.sensitive_vars)
            .field("backend_config", &self.backend_config)
            .field("retryable_errors", &self.retryable_errors.len())
            .field("max_retries", &self.max_retries)
            .field("time_between_retries", &self.time_between_retries)
            .field("no_color", &self.no_color)
            .finish_non_exhaustive()
    }
}
