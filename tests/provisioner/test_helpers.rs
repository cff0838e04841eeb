//! Shared fixtures for provisioner BDD scenarios.

use std::time::Duration;

use marionette::ProvisionerConfig;
use marionette::test_support::{ScriptedBackend, ScriptedProbe};
use rstest::fixture;

/// What a `When` step observed.
#[derive(Clone, Debug)]
pub struct LifecycleOutcome {
    pub state: String,
    pub setup_error: Option<String>,
    pub teardown_error: Option<String>,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct ProvisionerContext {
    pub backend: ScriptedBackend,
    pub probe: ScriptedProbe,
    pub config: ProvisionerConfig,
    pub outcome: Option<LifecycleOutcome>,
}

#[fixture]
pub fn provisioner_context() -> ProvisionerContext {
    ProvisionerContext {
        backend: ScriptedBackend::new(),
        probe: ScriptedProbe::always(true),
        config: ProvisionerConfig::default().with_max_provisioning_retries(3),
        outcome: None,
    }
}

/// Scripted probe answers: `failures` unhealthy replies, then healthy.
pub fn warming_probe(failures: usize) -> ScriptedProbe {
    ScriptedProbe::sequence(&vec![false; failures], true)
}
