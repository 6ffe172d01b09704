// infra-tests/src/lib.rs
// ============================================================================
// Module: Infrastructure System Tests Library
// Description: Shared configuration for infrastructure system-test binaries.
// Purpose: Resolve module paths, tool settings, and artifact roots once.
// Dependencies: infra-harness
// ============================================================================

//! ## Overview
//! This crate hosts configuration shared by the system-test binaries in
//! `infra-tests/tests`. Live scenarios provision real cloud resources and are
//! gated behind the `live-infra` feature; offline suites always build.
//! Security posture: credentials come from the environment and are redacted
//! everywhere they could be echoed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
