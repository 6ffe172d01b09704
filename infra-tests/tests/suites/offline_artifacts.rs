// infra-tests/tests/suites/offline_artifacts.rs
// ============================================================================
// Module: Offline Artifact Reporting
// Description: Summary artifacts for passing, skipped, and aborted scenarios.
// Purpose: Ensure every scenario outcome leaves a readable summary behind.
// Dependencies: infra-tests helpers, serde_json, tempfile
// ============================================================================

//! Summary artifact coverage.

use std::error::Error;
use std::fs;
use std::panic;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

use crate::helpers::artifacts::STATUS_PASS;
use crate::helpers::artifacts::STATUS_SKIPPED;
use crate::helpers::artifacts::TestReporter;
use crate::helpers::artifacts::summary_files;

fn read_summary(root: &Path) -> Result<Value, Box<dyn Error>> {
    let bytes = fs::read(root.join("summary.json"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[test]
fn passing_summary_records_run_and_notes() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let root = temp.path().join("pass");
    let mut reporter = TestReporter::at("terraform_infrastructure", root.clone())?;
    reporter.set_run_id("ab12cd");
    reporter.finish(STATUS_PASS, vec!["outputs verified".to_string()], summary_files())?;

    let summary = read_summary(&root)?;
    if summary["status"] != STATUS_PASS || summary["run_id"] != "ab12cd" {
        return Err(format!("unexpected summary: {summary}").into());
    }
    if summary["notes"][0] != "outputs verified" {
        return Err("notes were not recorded".into());
    }
    let markdown = fs::read_to_string(root.join("summary.md"))?;
    if !markdown.contains("terraform_infrastructure") || !markdown.contains("outputs verified") {
        return Err(format!("unexpected markdown: {markdown}").into());
    }
    Ok(())
}

#[test]
fn skipped_summary_carries_reason() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let mut reporter = TestReporter::at("s3_bucket_configuration", temp.path().to_path_buf())?;
    reporter.skip("GITHUB_TOKEN is not set")?;
    drop(reporter);

    let summary = read_summary(temp.path())?;
    if summary["status"] != STATUS_SKIPPED {
        return Err(format!("skip overwritten on drop: {summary}").into());
    }
    if summary["notes"][0] != "GITHUB_TOKEN is not set" {
        return Err("skip reason missing".into());
    }
    Ok(())
}

#[test]
fn unfinished_reporter_writes_unknown() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    drop(TestReporter::at("terraform_plan", temp.path().to_path_buf())?);
    let summary = read_summary(temp.path())?;
    if summary["status"] != "unknown" {
        return Err(format!("expected unknown status: {summary}").into());
    }
    Ok(())
}

#[test]
fn panicking_scenario_writes_panic_summary() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let root = temp.path().to_path_buf();
    let reporter_root = root.clone();
    let outcome = panic::catch_unwind(move || {
        let _reporter = TestReporter::at("terraform_infrastructure", reporter_root);
        panic::resume_unwind(Box::new("assertion failed"));
    });
    if outcome.is_ok() {
        return Err("scenario should have panicked".into());
    }
    let summary = read_summary(&root)?;
    if summary["status"] != "panic" {
        return Err(format!("expected panic status: {summary}").into());
    }
    Ok(())
}
