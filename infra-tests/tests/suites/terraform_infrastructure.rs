// infra-tests/tests/suites/terraform_infrastructure.rs
// ============================================================================
// Module: Pipeline Infrastructure Scenario
// Description: Full provision, output verification, and teardown.
// Purpose: Prove the pipeline module applies and exposes the expected names.
// Dependencies: infra-tests helpers, infra-harness
// ============================================================================

//! Live pipeline provisioning coverage.

use std::error::Error;

use infra_harness::RunKind;

use crate::helpers::artifacts::STATUS_PASS;
use crate::helpers::harness::LiveHarness;
use crate::helpers::harness::live_artifacts;
use crate::helpers::scenarios::pipeline_infrastructure;

#[test]
fn terraform_infrastructure() -> Result<(), Box<dyn Error>> {
    let Some(mut harness) =
        LiveHarness::prepare("terraform_infrastructure", RunKind::Infrastructure)?
    else {
        return Ok(());
    };
    let tf = harness.terraform()?;
    let verified = pipeline_infrastructure(
        &tf,
        harness.retry(),
        harness.sink(),
        harness.reporter.artifacts(),
    )?;

    let notes = verified
        .iter()
        .map(|output| format!("{} = {}", output.name, output.value))
        .chain([format!("provisioned and destroyed {}", harness.run.project_name())])
        .collect();
    harness.reporter.finish(STATUS_PASS, notes, live_artifacts(&["plan.txt", "outputs.json"]))?;
    Ok(())
}
