// infra-tests/tests/suites/offline_scenarios.rs
// ============================================================================
// Module: Offline Scenario Flows
// Description: The live scenario bodies run over a scripted command runner.
// Purpose: Pin lifecycle ordering, teardown, and redaction without AWS.
// Dependencies: infra-tests helpers, infra-harness, tempfile
// ============================================================================

//! Offline coverage for the three scenario bodies the live suites run.

use std::cell::Cell;
use std::error::Error;
use std::fs;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use infra_harness::Credentials;
use infra_harness::RunConfig;
use infra_harness::RunKind;
use infra_harness::TeardownError;
use infra_harness::Terraform;
use infra_harness::TerraformOptions;
use infra_harness::config::PolicySettings;
use infra_harness::config::RetrySettings;
use infra_harness::events::EventKind;
use infra_harness::events::FileEventSink;
use infra_harness::events::MemoryEventSink;
use infra_harness::events::NoopEventSink;
use infra_harness::s3::BucketInspector;
use infra_harness::s3::S3Error;
use infra_harness::s3::VersioningStatus;
use infra_harness::terraform::ScriptedRunner;
use tempfile::TempDir;

use crate::helpers::artifacts::STATUS_PASS;
use crate::helpers::artifacts::TestArtifacts;
use crate::helpers::artifacts::TestReporter;
use crate::helpers::artifacts::summary_files;
use crate::helpers::scenarios::artifact_bucket;
use crate::helpers::scenarios::pipeline_infrastructure;
use crate::helpers::scenarios::plan_only;

const TOKEN: &str = "ghp_offline_token";
const FULL_PLAN: &str = "# aws_codepipeline.main\n# aws_s3_bucket.artifacts\n# \
                         aws_codebuild_project.build\n";

fn run(kind: RunKind) -> RunConfig {
    let credentials = Credentials {
        github_repo: "acme/widgets".to_string(),
        github_token: TOKEN.to_string(),
    };
    RunConfig::with_id(kind, "off123", "ap-south-1", &credentials)
}

fn instant(max_attempts: u32) -> PolicySettings {
    PolicySettings {
        max_attempts,
        delay_secs: 0,
    }
}

fn fast_retry() -> RetrySettings {
    RetrySettings {
        output_check: instant(3),
        destroy: instant(3),
        bucket_exists: instant(5),
        bucket_versioning: instant(3),
    }
}

fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

/// Runner answering the three pipeline outputs with the expected names.
fn pipeline_outputs(run: &RunConfig) -> ScriptedRunner {
    let project = run.project_name();
    ScriptedRunner::new()
        .succeed("output", &quoted(&format!("{project}-pipeline")))
        .succeed("output", &quoted(&format!("{project}-codepipeline-artifacts-x1")))
        .succeed("output", &quoted(&format!("{project}-build")))
}

// ============================================================================
// SECTION: Pipeline Infrastructure
// ============================================================================

#[test]
fn pipeline_scenario_runs_full_lifecycle() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let report_root = temp.path().join("report");
    let mut reporter = TestReporter::at("terraform_infrastructure", report_root.clone())?;
    let log_path = temp.path().join("events.jsonl");
    let sink = Arc::new(FileEventSink::new(&log_path)?);

    let run = run(RunKind::Infrastructure);
    reporter.set_run_id(run.unique_id());
    let runner = pipeline_outputs(&run).succeed("plan", &format!("{FULL_PLAN}token {TOKEN}\n"));
    let tf = Terraform::with_runner(TerraformOptions::for_run("/work", &run), runner, sink.clone())
        .with_run_id(run.unique_id());

    let verified =
        pipeline_infrastructure(&tf, &fast_retry(), sink.as_ref(), reporter.artifacts())?;

    let subcommands = tf.runner().subcommands();
    if subcommands
        != ["init", "validate", "plan", "apply", "output", "output", "output", "destroy"]
    {
        return Err(format!("unexpected command order: {}", subcommands.join(" ")).into());
    }
    if verified.len() != 3 || verified[2].value != "devops-masters-test-off123-build" {
        return Err("outputs were not verified".into());
    }
    let plan = fs::read_to_string(report_root.join("plan.txt"))?;
    if plan.contains(TOKEN) || !plan.contains("token ***") {
        return Err("plan artifact was not redacted".into());
    }
    if !report_root.join("outputs.json").is_file() {
        return Err("outputs.json missing".into());
    }
    let log = fs::read_to_string(&log_path)?;
    if log.contains(TOKEN) {
        return Err("event log leaked the access token".into());
    }
    if !log.contains("teardown_completed") {
        return Err("teardown completion was not logged".into());
    }

    reporter.finish(STATUS_PASS, vec!["offline pipeline lifecycle".to_string()], summary_files())?;
    Ok(())
}

#[test]
fn pipeline_scenario_destroys_after_failed_output_check() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let artifacts = TestArtifacts::at(temp.path().to_path_buf())?;
    let sink = Arc::new(MemoryEventSink::default());
    let run = run(RunKind::Infrastructure);
    let runner = ScriptedRunner::new().succeed("plan", FULL_PLAN);
    let tf = Terraform::with_runner(TerraformOptions::for_run("/work", &run), runner, sink.clone());

    let Err(err) = pipeline_infrastructure(&tf, &fast_retry(), sink.as_ref(), &artifacts) else {
        return Err("missing outputs should fail the scenario".into());
    };
    match err.downcast_ref::<TeardownError<Box<dyn Error>>>() {
        Some(TeardownError::Body(_)) => {}
        _ => return Err(format!("unexpected scenario error: {err}").into()),
    }
    if tf.runner().count("output") != 3 || tf.runner().count("destroy") != 1 {
        return Err("output polling or teardown did not run as budgeted".into());
    }
    if artifacts.root().join("outputs.json").exists() {
        return Err("failed scenario must not write outputs.json".into());
    }
    Ok(())
}

#[test]
fn pipeline_scenario_reports_leaked_resources() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let artifacts = TestArtifacts::at(temp.path().to_path_buf())?;
    let sink = Arc::new(MemoryEventSink::default());
    let run = run(RunKind::Infrastructure);
    let runner = pipeline_outputs(&run)
        .succeed("plan", FULL_PLAN)
        .fail("destroy", 3, "Error: BucketNotEmpty");
    let tf = Terraform::with_runner(TerraformOptions::for_run("/work", &run), runner, sink.clone());

    let Err(err) = pipeline_infrastructure(&tf, &fast_retry(), sink.as_ref(), &artifacts) else {
        return Err("a failed destroy must fail the scenario".into());
    };
    let leaked = err
        .downcast_ref::<TeardownError<Box<dyn Error>>>()
        .is_some_and(TeardownError::is_leak);
    if !leaked || !err.to_string().contains("test/terraform-off123.tfstate") {
        return Err(format!("leak not reported: {err}").into());
    }
    if !sink.kinds().contains(&EventKind::DestroyExhausted) {
        return Err("destroy exhaustion was not logged".into());
    }
    Ok(())
}

// ============================================================================
// SECTION: Artifact Bucket
// ============================================================================

/// Bucket that appears on the second lookup with versioning enabled.
struct LateBucket {
    /// Lookups observed so far.
    lookups: Cell<u32>,
}

impl BucketInspector for LateBucket {
    fn bucket_exists(&self, _bucket: &str) -> Result<bool, S3Error> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.lookups.get() >= 2)
    }

    fn bucket_versioning(&self, _bucket: &str) -> Result<VersioningStatus, S3Error> {
        Ok(VersioningStatus::Enabled)
    }
}

/// Inspector whose client blows up mid-scenario.
struct PanickingInspector;

impl BucketInspector for PanickingInspector {
    fn bucket_exists(&self, _bucket: &str) -> Result<bool, S3Error> {
        panic::resume_unwind(Box::new("s3 client crashed"))
    }

    fn bucket_versioning(&self, _bucket: &str) -> Result<VersioningStatus, S3Error> {
        Ok(VersioningStatus::Disabled)
    }
}

#[test]
fn bucket_scenario_checks_existence_and_versioning() -> Result<(), Box<dyn Error>> {
    let sink = Arc::new(MemoryEventSink::default());
    let run = run(RunKind::S3Bucket);
    let bucket = format!("{}-codepipeline-artifacts-x1", run.project_name());
    let runner = ScriptedRunner::new().succeed("output", &quoted(&bucket));
    let tf = Terraform::with_runner(TerraformOptions::for_run("/work", &run), runner, sink.clone());
    let inspector = LateBucket {
        lookups: Cell::new(0),
    };

    let report = artifact_bucket(&tf, &inspector, &fast_retry(), sink.as_ref())?;

    if report.bucket != bucket || report.versioning != VersioningStatus::Enabled {
        return Err(format!("unexpected bucket {} ({})", report.bucket, report.versioning).into());
    }
    let subcommands = tf.runner().subcommands();
    if subcommands != ["init", "validate", "apply", "output", "destroy"] {
        return Err(format!("unexpected command order: {}", subcommands.join(" ")).into());
    }
    if inspector.lookups.get() != 2 {
        return Err("bucket existence should have been polled twice".into());
    }
    Ok(())
}

#[test]
fn bucket_scenario_destroys_before_resuming_panic() -> Result<(), Box<dyn Error>> {
    let sink = Arc::new(MemoryEventSink::default());
    let run = run(RunKind::S3Bucket);
    let runner = ScriptedRunner::new().succeed("output", "\"bucket\"");
    let tf = Terraform::with_runner(TerraformOptions::for_run("/work", &run), runner, sink.clone());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        artifact_bucket(&tf, &PanickingInspector, &fast_retry(), sink.as_ref())
    }));
    if outcome.is_ok() {
        return Err("panic must propagate after teardown".into());
    }
    if tf.runner().subcommands().last().map(String::as_str) != Some("destroy") {
        return Err("destroy must run after a panicking body".into());
    }
    if !sink.kinds().contains(&EventKind::TestPanicked) {
        return Err("panic was not recorded".into());
    }
    Ok(())
}

// ============================================================================
// SECTION: Plan Only
// ============================================================================

#[test]
fn plan_scenario_validates_and_never_applies() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let artifacts = TestArtifacts::at(temp.path().to_path_buf())?;
    let run = run(RunKind::PlanOnly);
    let runner = ScriptedRunner::new().succeed("plan", FULL_PLAN);
    let tf = Terraform::with_runner(
        TerraformOptions::for_run("/work", &run),
        runner,
        Arc::new(NoopEventSink),
    );

    plan_only(&tf, &artifacts)?;

    let subcommands = tf.runner().subcommands();
    if subcommands != ["init", "validate", "plan"] {
        return Err(format!("unexpected command order: {}", subcommands.join(" ")).into());
    }
    let init = &tf.runner().calls()[0];
    if !init.args.contains(&"-backend-config=key=test/terraform-plan-off123.tfstate".to_string()) {
        return Err("plan-only run must use its own backend key".into());
    }
    if !artifacts.root().join("plan.txt").is_file() {
        return Err("plan.txt missing".into());
    }
    Ok(())
}

#[test]
fn plan_scenario_fails_on_missing_resource_type() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let artifacts = TestArtifacts::at(temp.path().to_path_buf())?;
    let run = run(RunKind::PlanOnly);
    let runner = ScriptedRunner::new().succeed("plan", "# aws_s3_bucket.artifacts\n");
    let tf = Terraform::with_runner(
        TerraformOptions::for_run("/work", &run),
        runner,
        Arc::new(NoopEventSink),
    );

    let Err(err) = plan_only(&tf, &artifacts) else {
        return Err("incomplete plan should fail".into());
    };
    if !err.to_string().contains("aws_codepipeline, aws_codebuild_project") {
        return Err(format!("unexpected plan error: {err}").into());
    }
    if tf.runner().subcommands() != ["init", "validate", "plan"] {
        return Err("plan-only scenario must stop after plan".into());
    }
    Ok(())
}
