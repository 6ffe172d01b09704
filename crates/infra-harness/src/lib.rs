// crates/infra-harness/src/lib.rs
// ============================================================================
// Module: Infrastructure Harness Library
// Description: Orchestration glue for provisioning-tool integration tests.
// Purpose: Drive terraform lifecycles, verify outputs, and guarantee teardown.
// Dependencies: aws-sdk-s3, regex, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `infra-harness` wraps an external provisioning tool (`terraform`) behind a
//! small blocking driver. Test scenarios build a [`run::RunConfig`], call the
//! init/validate/plan/apply/destroy lifecycle, poll named outputs with a
//! bounded [`retry::RetryPolicy`], and run teardown through
//! [`lifecycle::with_teardown`] so destroy executes even when the body panics.
//!
//! Credentials are treated as secrets: the access token never appears on a
//! command line, in an event, or in an error message.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assertions;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod retry;
pub mod run;
pub mod s3;
pub mod terraform;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assertions::AssertionError;
pub use assertions::OutputExpectation;
pub use config::ConfigError;
pub use config::Credentials;
pub use config::HarnessConfig;
pub use config::HarnessSettings;
pub use events::EventSink;
pub use events::HarnessEvent;
pub use lifecycle::TeardownError;
pub use lifecycle::with_teardown;
pub use retry::RetryError;
pub use retry::RetryPolicy;
pub use run::RunConfig;
pub use run::RunKind;
pub use terraform::Terraform;
pub use terraform::TerraformError;
pub use terraform::TerraformOptions;
