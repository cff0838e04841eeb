//! BDD step definitions for the provisioner lifecycle.

use std::time::Duration;

use marionette::Provisioner;
use marionette::test_support::ScriptedProbe;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::{Builder, Runtime};
use tokio::time::Instant;

use super::test_helpers::{LifecycleOutcome, ProvisionerContext, warming_probe};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a backend that provisions successfully")]
fn backend_provisions(provisioner_context: ProvisionerContext) -> ProvisionerContext {
    provisioner_context
}

#[given("a backend that fails to provision {times} times")]
fn backend_fails_times(mut provisioner_context: ProvisionerContext, times: u32) -> ProvisionerContext {
    provisioner_context.backend = provisioner_context.backend.failing_provision(times);
    provisioner_context
}

#[given("a backend that never provisions")]
fn backend_never_provisions(mut provisioner_context: ProvisionerContext) -> ProvisionerContext {
    provisioner_context.backend = provisioner_context.backend.always_failing_provision();
    provisioner_context
}

#[given("a daemon that is healthy after {failures} failed probes")]
fn daemon_healthy_after(
    mut provisioner_context: ProvisionerContext,
    failures: usize,
) -> ProvisionerContext {
    provisioner_context.probe = warming_probe(failures);
    provisioner_context
}

#[given("a daemon that never becomes healthy")]
fn daemon_never_healthy(mut provisioner_context: ProvisionerContext) -> ProvisionerContext {
    provisioner_context.probe = ScriptedProbe::always(false);
    provisioner_context
}

#[given("a health check budget of {secs} seconds")]
fn health_budget(mut provisioner_context: ProvisionerContext, secs: u64) -> ProvisionerContext {
    provisioner_context.config = provisioner_context
        .config
        .with_max_health_retries(100)
        .with_health_check_timeout(Duration::from_secs(secs));
    provisioner_context
}

#[given("teardown fails with \"{message}\"")]
fn teardown_fails(mut provisioner_context: ProvisionerContext, message: String) -> ProvisionerContext {
    provisioner_context.backend = provisioner_context.backend.failing_deprovision(&message);
    provisioner_context
}

#[when("the provisioner is set up")]
fn set_up(provisioner_context: ProvisionerContext) -> Result<ProvisionerContext, StepError> {
    run_lifecycle(provisioner_context, false)
}

#[when("the provisioner is set up and torn down")]
fn set_up_and_tear_down(
    provisioner_context: ProvisionerContext,
) -> Result<ProvisionerContext, StepError> {
    run_lifecycle(provisioner_context, true)
}

fn paused_runtime() -> Result<Runtime, StepError> {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| StepError::Assertion(err.to_string()))
}

fn run_lifecycle(
    mut provisioner_context: ProvisionerContext,
    tear_down: bool,
) -> Result<ProvisionerContext, StepError> {
    let runtime = paused_runtime()?;
    let mut subject = Provisioner::with_probe(
        provisioner_context.backend.clone(),
        provisioner_context.probe.clone(),
        provisioner_context.config.clone(),
    );

    let outcome = runtime.block_on(async move {
        let start = Instant::now();
        let setup_error = subject.setup().await.err().map(|err| err.to_string());
        let elapsed = start.elapsed();
        if tear_down {
            subject.teardown().await;
        }
        LifecycleOutcome {
            state: subject.state().to_string(),
            setup_error,
            teardown_error: subject.last_teardown_error().map(str::to_owned),
            elapsed,
        }
    });

    provisioner_context.outcome = Some(outcome);
    Ok(provisioner_context)
}

fn outcome(provisioner_context: &ProvisionerContext) -> Result<&LifecycleOutcome, StepError> {
    provisioner_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

fn expect_count(what: &str, expected: usize, actual: usize) -> Result<(), StepError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {what} {expected} times, got {actual}"
        )))
    }
}

#[then("the provisioner state is \"{state}\"")]
fn state_is(provisioner_context: &ProvisionerContext, state: String) -> Result<(), StepError> {
    let observed = &outcome(provisioner_context)?.state;
    if *observed == state {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected state {state}, got {observed}"
        )))
    }
}

#[then("the backend was asked to provision {count} times")]
fn provision_count(provisioner_context: &ProvisionerContext, count: usize) -> Result<(), StepError> {
    expect_count(
        "provision",
        count,
        provisioner_context.backend.provision_calls().len(),
    )
}

#[then("the daemon was probed {count} times")]
fn probe_count(provisioner_context: &ProvisionerContext, count: usize) -> Result<(), StepError> {
    expect_count("probe", count, provisioner_context.probe.call_times().len())
}

#[then("the backend was deprovisioned {count} times")]
fn deprovision_count(
    provisioner_context: &ProvisionerContext,
    count: usize,
) -> Result<(), StepError> {
    expect_count(
        "deprovision",
        count,
        provisioner_context.backend.deprovision_calls(),
    )
}

#[then("setup took {secs} seconds")]
fn setup_took(provisioner_context: &ProvisionerContext, secs: u64) -> Result<(), StepError> {
    let elapsed = outcome(provisioner_context)?.elapsed;
    if elapsed == Duration::from_secs(secs) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected setup to take {secs}s, took {elapsed:?}"
        )))
    }
}

#[then("the setup error mentions \"{text}\"")]
fn setup_error_mentions(
    provisioner_context: &ProvisionerContext,
    text: String,
) -> Result<(), StepError> {
    match outcome(provisioner_context)?.setup_error.as_deref() {
        Some(message) if message.contains(&text) => Ok(()),
        Some(message) => Err(StepError::Assertion(format!(
            "expected setup error to mention {text:?}, got {message:?}"
        ))),
        None => Err(StepError::Assertion(String::from(
            "expected setup to fail",
        ))),
    }
}

#[then("the teardown error mentions \"{text}\"")]
fn teardown_error_mentions(
    provisioner_context: &ProvisionerContext,
    text: String,
) -> Result<(), StepError> {
    match outcome(provisioner_context)?.teardown_error.as_deref() {
        Some(message) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected teardown error to mention {text:?}, got {other:?}"
        ))),
    }
}
