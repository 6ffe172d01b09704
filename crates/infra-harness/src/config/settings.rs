// crates/infra-harness/src/config/settings.rs
// ============================================================================
// Module: Harness Settings
// Description: Optional TOML settings for retry policy and tool behavior.
// Purpose: Let CI tune retry budgets without code changes.
// Dependencies: regex, serde, toml
// ============================================================================

//! ## Overview
//! Settings are optional. When no file is configured the defaults reproduce
//! the scenario budgets: output checks 3×5s, destroy 3×10s, bucket existence
//! 5×10s, versioning 3×5s, and terraform commands retried up to 3 times, 5s
//! apart, on any failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use super::ConfigError;
use crate::retry::RetryPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum settings file size in bytes.
pub const MAX_SETTINGS_FILE_SIZE: usize = 1024 * 1024;
/// Upper bound on any configured attempt count.
const MAX_ATTEMPTS: u32 = 50;
/// Upper bound on any configured delay, in seconds.
const MAX_DELAY_SECS: u64 = 600;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Harness settings loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    /// Retry policies for polling and teardown.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Provisioning tool settings.
    #[serde(default)]
    pub terraform: TerraformSettings,
}

/// Bounded retry budget for a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds.
    pub delay_secs: u64,
}

impl PolicySettings {
    /// Converts the settings into a runtime retry policy.
    #[must_use]
    pub const fn to_policy(self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }

    /// Validates attempt and delay bounds.
    fn validate(self, name: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "retry.{name}.max_attempts must be between 1 and {MAX_ATTEMPTS}"
            )));
        }
        if self.delay_secs > MAX_DELAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "retry.{name}.delay_secs must be at most {MAX_DELAY_SECS}"
            )));
        }
        Ok(())
    }
}

/// Retry policies per polled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    /// Output polling after apply.
    #[serde(default = "default_output_check")]
    pub output_check: PolicySettings,
    /// Destroy during teardown.
    #[serde(default = "default_destroy")]
    pub destroy: PolicySettings,
    /// Bucket existence polling against S3.
    #[serde(default = "default_bucket_exists")]
    pub bucket_exists: PolicySettings,
    /// Bucket versioning lookup against S3.
    #[serde(default = "default_bucket_versioning")]
    pub bucket_versioning: PolicySettings,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            output_check: default_output_check(),
            destroy: default_destroy(),
            bucket_exists: default_bucket_exists(),
            bucket_versioning: default_bucket_versioning(),
        }
    }
}

/// Provisioning tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerraformSettings {
    /// Binary override (environment override takes precedence).
    #[serde(default)]
    pub binary: Option<String>,
    /// Extra attempts after a retryable command failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between command retries, in seconds.
    #[serde(default = "default_time_between_retries_secs")]
    pub time_between_retries_secs: u64,
    /// Retryable error patterns mapped to a human-readable description.
    #[serde(default = "default_retryable_errors")]
    pub retryable_errors: BTreeMap<String, String>,
    /// Merge the built-in transient error patterns.
    #[serde(default = "default_true")]
    pub include_default_retryable_errors: bool,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: None,
            max_retries: default_max_retries(),
            time_between_retries_secs: default_time_between_retries_secs(),
            retryable_errors: default_retryable_errors(),
            include_default_retryable_errors: true,
        }
    }
}

impl TerraformSettings {
    /// Returns the delay between command retries.
    #[must_use]
    pub const fn time_between_retries(&self) -> Duration {
        Duration::from_secs(self.time_between_retries_secs)
    }

    /// Validates retry bounds and pattern syntax.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "terraform.max_retries must be at most {MAX_ATTEMPTS}"
            )));
        }
        if self.time_between_retries_secs > MAX_DELAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "terraform.time_between_retries_secs must be at most {MAX_DELAY_SECS}"
            )));
        }
        if let Some(binary) = &self.binary
            && binary.trim().is_empty()
        {
            return Err(ConfigError::Invalid("terraform.binary must not be empty".to_string()));
        }
        for pattern in self.retryable_errors.keys() {
            Regex::new(pattern).map_err(|err| {
                ConfigError::Invalid(format!("terraform.retryable_errors `{pattern}`: {err}"))
            })?;
        }
        Ok(())
    }
}

impl HarnessSettings {
    /// Loads settings from `path`, or returns defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, exceeds the size
    /// limit, is not UTF-8 TOML, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(ConfigError::Invalid("settings file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("settings file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates every retry budget and tool setting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.output_check.validate("output_check")?;
        self.retry.destroy.validate("destroy")?;
        self.retry.bucket_exists.validate("bucket_exists")?;
        self.retry.bucket_versioning.validate("bucket_versioning")?;
        self.terraform.validate()
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default output polling budget.
const fn default_output_check() -> PolicySettings {
    PolicySettings {
        max_attempts: 3,
        delay_secs: 5,
    }
}

/// Default destroy budget.
const fn default_destroy() -> PolicySettings {
    PolicySettings {
        max_attempts: 3,
        delay_secs: 10,
    }
}

/// Default bucket existence budget.
const fn default_bucket_exists() -> PolicySettings {
    PolicySettings {
        max_attempts: 5,
        delay_secs: 10,
    }
}

/// Default bucket versioning budget.
const fn default_bucket_versioning() -> PolicySettings {
    PolicySettings {
        max_attempts: 3,
        delay_secs: 5,
    }
}

/// Default extra attempts for retryable command failures.
const fn default_max_retries() -> u32 {
    3
}

/// Default delay between command retries.
const fn default_time_between_retries_secs() -> u64 {
    5
}

/// Retries every failure by default.
fn default_retryable_errors() -> BTreeMap<String, String> {
    BTreeMap::from([(".*".to_string(), "Terraform command failed".to_string())])
}

/// Serde helper for `true` defaults.
const fn default_true() -> bool {
    true
}
