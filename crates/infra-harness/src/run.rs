// crates/infra-harness/src/run.rs
// ============================================================================
// Module: Run Configuration
// Description: Per-invocation identifiers, names, and provisioning variables.
// Purpose: Isolate concurrent runs through unique names and backend keys.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! A [`RunConfig`] is assembled once per scenario and never mutated. Its
//! unique identifier flows into the project name (and therefore into every
//! provisioned resource name) and into the backend key, which keeps parallel
//! runs from sharing remote state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;

use crate::config::Credentials;


// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment tag passed to every run.
pub const ENVIRONMENT_TAG: &str = "test";
/// Length of generated run identifiers.
pub const UNIQUE_ID_LEN: usize = 6;
/// Identifier alphabet; lowercase so names stay valid S3 bucket names.
const UNIQUE_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Variable carrying the AWS region.
pub const VAR_AWS_REGION: &str = "aws_region";
/// Variable carrying the project name.
pub const VAR_PROJECT_NAME: &str = "project_name";
/// Variable carrying the repository identifier.
pub const VAR_GITHUB_REPO: &str = "github_repo";
/// Variable carrying the repository token.
pub const VAR_GITHUB_TOKEN: &str = "github_token";
/// Variable carrying the environment tag.
pub const VAR_ENVIRONMENT: &str = "environment";
/// Variables that must never appear on a command line or in logs.
pub const SENSITIVE_VARS: &[&str] = &[VAR_GITHUB_TOKEN];
/// Backend configuration key holding the state location.
pub const BACKEND_KEY: &str = "key";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Scenario family; selects the project prefix and backend key format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Full pipeline provisioning with output checks.
    Infrastructure,
    /// Artifact bucket provisioning with live S3 checks.
    S3Bucket,
    /// Plan-only validation; nothing is applied.
    PlanOnly,
}

impl RunKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::S3Bucket => "s3_bucket",
            Self::PlanOnly => "plan_only",
        }
    }

    /// Project name prefix for the kind.
    #[must_use]
    pub const fn project_prefix(self) -> &'static str {
        match self {
            Self::Infrastructure => "devops-masters-test",
            Self::S3Bucket => "devops-masters-s3-test",
            Self::PlanOnly => "devops-masters-plan-test",
        }
    }

    /// Backend state key for a run identifier.
    #[must_use]
    pub fn backend_key(self, unique_id: &str) -> String {
        match self {
            Self::Infrastructure => format!("test/terraform-{unique_id}.tfstate"),
            Self::S3Bucket => format!("test/terraform-s3-{unique_id}.tfstate"),
            Self::PlanOnly => format!("test/terraform-plan-{unique_id}.tfstate"),
        }
    }
}

/// Immutable configuration for one scenario invocation.
///
/// # Invariants
/// - Fields are fixed at construction; there is no mutating API.
/// - `Debug` output never contains the token.
#[derive(Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Scenario family.
    kind: RunKind,
    /// Generated run identifier.
    unique_id: String,
    /// AWS region.
    region: String,
    /// Generated project name.
    project_name: String,
    /// Repository identifier.
    github_repo: String,
    /// Repository token.
    github_token: String,
    /// Environment tag.
    environment: String,
    /// Backend state key.
    backend_key: String,
}

impl RunConfig {
    /// Builds a run configuration with a freshly generated identifier.
    #[must_use]
    pub fn new(kind: RunKind, region: &str, credentials: &Credentials) -> Self {
        Self::with_id(kind, &unique_id(), region, credentials)
    }

    /// Builds a run configuration for a known identifier.
    #[must_use]
    pub fn with_id(kind: RunKind, id: &str, region: &str, credentials: &Credentials) -> Self {
        Self {
            kind,
            unique_id: id.to_string(),
            region: region.to_string(),
            project_name: format!("{}-{id}", kind.project_prefix()),
            github_repo: credentials.github_repo.clone(),
            github_token: credentials.github_token.clone(),
            environment: ENVIRONMENT_TAG.to_string(),
            backend_key: kind.backend_key(id),
        }
    }

    /// Scenario family.
    #[must_use]
    pub const fn kind(&self) -> RunKind {
        self.kind
    }

    /// Generated run identifier.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// AWS region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Generated project name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Repository identifier.
    #[must_use]
    pub fn github_repo(&self) -> &str {
        &self.github_repo
    }

    /// Environment tag.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Backend state key.
    #[must_use]
    pub fn backend_key(&self) -> &str {
        &self.backend_key
    }

    /// Provisioning variables, including the sensitive token.
    #[must_use]
    pub fn vars(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (VAR_AWS_REGION.to_string(), self.region.clone()),
            (VAR_PROJECT_NAME.to_string(), self.project_name.clone()),
            (VAR_GITHUB_REPO.to_string(), self.github_repo.clone()),
            (VAR_GITHUB_TOKEN.to_string(), self.github_token.clone()),
            (VAR_ENVIRONMENT.to_string(), self.environment.clone()),
        ])
    }

    /// Backend configuration selecting this run's state location.
    #[must_use]
    pub fn backend_config(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(BACKEND_KEY.to_string(), self.backend_key.clone())])
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("kind", &self.kind)
            .field("unique_id", &self.unique_id)
            .field("region", &self.region)
            .field("project_name", &self.project_name)
            .field("github_repo", &self.github_repo)
            .field("github_token", &"***")
            .field("environment", &self.environment)
            .field("backend_key", &self.backend_key)
            .finish()
    }
}

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Generates a short random identifier from `[a-z0-9]`.
#[must_use]
pub fn unique_id() -> String {
    let mut rng = rand::thread_rng();
    (0..UNIQUE_ID_LEN)
        .map(|_| char::from(UNIQUE_ID_ALPHABET[rng.gen_range(0..UNIQUE_ID_ALPHABET.len())]))
        .collect()
}
