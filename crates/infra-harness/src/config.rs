// crates/infra-harness/src/config.rs
// ============================================================================
// Module: Harness Configuration
// Description: Environment and settings-file configuration for the harness.
// Purpose: Provide typed access to credentials, tool paths, and retry policy.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Harness configuration comes from two places. Environment variables supply
//! the region, repository credentials and tool overrides. An optional TOML
//! settings file tunes retry policies. Both are parsed strictly. Invalid input
//! fails closed. Missing credentials are not an error: callers skip the test.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;
mod settings;


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::Credentials;
pub use env::DEFAULT_AWS_REGION;
pub use env::DEFAULT_TERRAFORM_BIN;
pub use env::EnvValue;
pub use env::HarnessConfig;
pub use env::HarnessEnv;
pub use env::env_or_fallback;
pub use env::read_env_strict;
pub use settings::HarnessSettings;
pub use settings::MAX_SETTINGS_FILE_SIZE;
pub use settings::PolicySettings;
pub use settings::RetrySettings;
pub use settings::TerraformSettings;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}
