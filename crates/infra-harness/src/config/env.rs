// crates/infra-harness/src/config/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed configuration for infrastructure tests.
// Purpose: Centralize env parsing with strict UTF-8 validation and fallbacks.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement. Scenario
//! inputs (region, repository, token) follow fallback semantics: an unset or
//! empty variable yields the fallback, and an empty fallback means absent.
//! Harness overrides (tool paths, run root, event log) reject empty values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;

use super::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Region used when `AWS_DEFAULT_REGION` is unset.
pub const DEFAULT_AWS_REGION: &str = "ap-south-1";
/// Provisioning tool binary used when no override is configured.
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment keys recognized by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// AWS region for provisioning and S3 inspection.
    AwsRegion,
    /// Source repository identifier wired into the pipeline.
    GithubRepo,
    /// Access token for the source repository.
    GithubToken,
    /// Optional infrastructure definition directory override.
    TerraformDir,
    /// Optional provisioning tool binary override.
    TerraformBin,
    /// Optional TOML settings file path.
    ConfigPath,
    /// Optional artifact run root override.
    RunRoot,
    /// Optional JSON-lines event log path (stderr when unset).
    EventLog,
    /// Optional S3-compatible endpoint override.
    S3Endpoint,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwsRegion => "AWS_DEFAULT_REGION",
            Self::GithubRepo => "GITHUB_REPO",
            Self::GithubToken => "GITHUB_TOKEN",
            Self::TerraformDir => "INFRA_TEST_TERRAFORM_DIR",
            Self::TerraformBin => "INFRA_TEST_TERRAFORM_BIN",
            Self::ConfigPath => "INFRA_TEST_CONFIG",
            Self::RunRoot => "INFRA_TEST_RUN_ROOT",
            Self::EventLog => "INFRA_TEST_EVENT_LOG",
            Self::S3Endpoint => "INFRA_TEST_S3_ENDPOINT",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Value resolved from the environment or its fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvValue {
    /// Resolved value.
    pub value: String,
    /// True when the fallback was used instead of the environment.
    pub from_fallback: bool,
}

/// Repository credentials required by the live scenarios.
///
/// # Invariants
/// - `Debug` output never contains the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Repository identifier (`owner/name`).
    pub github_repo: String,
    /// Repository access token.
    pub github_token: String,
}

impl Credentials {
    /// Reads credentials from the environment.
    ///
    /// Returns `Ok(None)` when either value is unset or empty; scenarios treat
    /// that as a skip rather than a failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is not valid UTF-8.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let repo = env_or_fallback(HarnessEnv::GithubRepo.as_str(), "")?;
        let token = env_or_fallback(HarnessEnv::GithubToken.as_str(), "")?;
        match (repo, token) {
            (Some(repo), Some(token)) => Ok(Some(Self {
                github_repo: repo.value,
                github_token: token.value,
            })),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("github_repo", &self.github_repo)
            .field("github_token", &"***")
            .finish()
    }
}

/// Typed harness configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// AWS region.
    pub region: String,
    /// Credentials, or `None` when the live scenarios must be skipped.
    pub credentials: Option<Credentials>,
    /// Infrastructure definition directory override.
    pub terraform_dir: Option<PathBuf>,
    /// Provisioning tool binary override.
    pub terraform_bin: Option<String>,
    /// Settings file path.
    pub settings_path: Option<PathBuf>,
    /// Artifact run root override.
    pub run_root: Option<PathBuf>,
    /// JSON-lines event log path.
    pub event_log: Option<PathBuf>,
    /// S3-compatible endpoint override.
    pub s3_endpoint: Option<String>,
    /// Environment variables that resolved to their fallback value.
    pub fallbacks: Vec<&'static str>,
}

impl HarnessConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is not valid UTF-8, or when a
    /// harness override is set but empty.
    pub fn load() -> Result<Self, ConfigError> {
        let mut fallbacks = Vec::new();
        let region_key = HarnessEnv::AwsRegion.as_str();
        let region = env_or_fallback(region_key, DEFAULT_AWS_REGION)?
            .ok_or_else(|| ConfigError::Invalid(format!("{region_key} must be set")))?;
        if region.from_fallback {
            fallbacks.push(region_key);
        }
        Ok(Self {
            region: region.value,
            credentials: Credentials::from_env()?,
            terraform_dir: read_env_nonempty(HarnessEnv::TerraformDir.as_str())?
                .map(PathBuf::from),
            terraform_bin: read_env_nonempty(HarnessEnv::TerraformBin.as_str())?,
            settings_path: read_env_nonempty(HarnessEnv::ConfigPath.as_str())?.map(PathBuf::from),
            run_root: read_env_nonempty(HarnessEnv::RunRoot.as_str())?.map(PathBuf::from),
            event_log: read_env_nonempty(HarnessEnv::EventLog.as_str())?.map(PathBuf::from),
            s3_endpoint: read_env_nonempty(HarnessEnv::S3Endpoint.as_str())?,
            fallbacks,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} must be valid UTF-8")))
    })
}

/// Resolves an environment variable with a fallback.
///
/// An unset or empty variable resolves to `fallback`. An empty fallback
/// resolves to `None`.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn env_or_fallback(name: &str, fallback: &str) -> Result<Option<EnvValue>, ConfigError> {
    if let Some(value) = read_env_strict(name)?
        && !value.is_empty()
    {
        return Ok(Some(EnvValue {
            value,
            from_fallback: false,
        }));
    }
    if fallback.is_empty() {
        return Ok(None);
    }
    Ok(Some(EnvValue {
        value: fallback.to_string(),
        from_fallback: true,
    }))
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}
