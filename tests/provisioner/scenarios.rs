//! BDD scenarios for the provisioner lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionerContext, provisioner_context};

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Reach running when the daemon is healthy at once"
)]
fn scenario_healthy_at_once(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Retry transient provisioning failures with backoff"
)]
fn scenario_transient_failures(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Give up after every provisioning attempt fails"
)]
fn scenario_provisioning_exhausted(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Wait for a daemon that warms up"
)]
fn scenario_warm_up(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Stop waiting once the health budget is spent"
)]
fn scenario_health_budget(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Tear down a running daemon"
)]
fn scenario_teardown(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}

#[scenario(
    path = "tests/features/provisioner.feature",
    name = "Record teardown failures without raising them"
)]
fn scenario_teardown_failure(provisioner_context: ProvisionerContext) {
    let _ = provisioner_context;
}
