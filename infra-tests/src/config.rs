// infra-tests/src/config.rs
// ============================================================================
// Module: Infrastructure Test Configuration
// Description: Environment plus settings-file configuration for scenarios.
// Purpose: Give every scenario the same module path, binary, and budgets.
// Dependencies: infra-harness
// ============================================================================

//! ## Overview
//! [`InfraTestConfig`] layers the harness environment over the optional TOML
//! settings file. Precedence for the tool binary is
//! `INFRA_TEST_TERRAFORM_BIN`, then `terraform.binary` in settings, then
//! `terraform` on `PATH`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use infra_harness::ConfigError;
use infra_harness::HarnessConfig;
use infra_harness::HarnessSettings;
use infra_harness::config::DEFAULT_TERRAFORM_BIN;


// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root for per-test artifacts when no override is configured.
pub const DEFAULT_ARTIFACT_ROOT: &str = "target/infra-tests";

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Resolved configuration for infrastructure scenarios.
#[derive(Debug, Clone)]
pub struct InfraTestConfig {
    /// Environment configuration.
    pub harness: HarnessConfig,
    /// Settings file contents (defaults when no file is configured).
    pub settings: HarnessSettings,
    /// Terraform root module directory.
    pub terraform_dir: PathBuf,
}

impl InfraTestConfig {
    /// Loads the environment and the optional settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the environment or settings are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let harness = HarnessConfig::load()?;
        let settings = HarnessSettings::load(harness.settings_path.as_deref())?;
        Ok(Self::from_parts(harness, settings))
    }

    /// Combines already-loaded configuration.
    #[must_use]
    pub fn from_parts(harness: HarnessConfig, settings: HarnessSettings) -> Self {
        let terraform_dir = harness.terraform_dir.clone().unwrap_or_else(default_terraform_dir);
        Self {
            harness,
            settings,
            terraform_dir,
        }
    }

    /// Tool binary after applying precedence.
    #[must_use]
    pub fn terraform_binary(&self) -> &str {
        self.harness
            .terraform_bin
            .as_deref()
            .or(self.settings.terraform.binary.as_deref())
            .unwrap_or(DEFAULT_TERRAFORM_BIN)
    }

    /// Artifact directory for a test.
    #[must_use]
    pub fn run_root(&self, test_name: &str) -> PathBuf {
        self.harness.run_root.clone().unwrap_or_else(|| default_run_root(test_name))
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Terraform module shipped next to this crate (`<workspace>/terraform`).
#[must_use]
pub fn default_terraform_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("terraform")
}

/// Timestamped artifact directory: `target/infra-tests/run_<ms>/<test>`.
#[must_use]
pub fn default_run_root(test_name: &str) -> PathBuf {
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    PathBuf::from(DEFAULT_ARTIFACT_ROOT).join(format!("run_{stamp}")).join(test_name)
}
