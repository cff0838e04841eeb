//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::time::{Duration, Instant};

use crate::action::{Key, MouseButton};
use crate::backend::{Backend, BackendFuture, ProvisionRequest};
use crate::daemon::DaemonEndpoint;
use crate::device::{DeviceFuture, InputDevice};
use crate::process::{CommandOutput, CommandRunner, SpawnError};
use crate::provisioner::{HealthProbe, ProbeFuture};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Clones share their script and invocation log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| SpawnError {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets (`Some`) or removes (`None`) environment variables while holding
    /// a global mutex.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Returns a loopback port with nothing listening on it.
///
/// # Errors
///
/// Returns the bind error when no ephemeral port is available.
pub fn closed_local_port() -> io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Waits until connecting to `address` is refused, polling every 10 ms.
/// Returns `false` if something is still accepting after `limit`.
pub async fn wait_until_refused(address: SocketAddr, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if TcpStream::connect(address).is_err() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Error returned by [`ScriptedBackend`] and [`RecordingDevice`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted failure: {0}")]
pub struct ScriptedFailure(pub String);

/// One call to [`ScriptedBackend::provision`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionCall {
    /// Clock reading when the call started.
    pub at: Instant,
    /// Request passed by the provisioner.
    pub request: ProvisionRequest,
}

#[derive(Debug)]
struct BackendScript {
    provision_failures: Option<u32>,
    running: VecDeque<bool>,
    running_default: bool,
    liveness_fails: bool,
    deprovision_error: Option<String>,
    deprovision_delay: Option<Duration>,
    preferred_port: Option<u16>,
    provision_calls: Vec<ProvisionCall>,
    is_running_calls: usize,
    deprovision_calls: usize,
}

/// Backend whose outcomes are scripted ahead of time. Clones share state, so
/// a test keeps a clone to inspect calls made by a provisioner.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    script: Arc<Mutex<BackendScript>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Backend that provisions successfully and always reports running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(BackendScript {
                provision_failures: Some(0),
                running: VecDeque::new(),
                running_default: true,
                liveness_fails: false,
                deprovision_error: None,
                deprovision_delay: None,
                preferred_port: None,
                provision_calls: Vec::new(),
                is_running_calls: 0,
                deprovision_calls: 0,
            })),
        }
    }

    /// Fails the next `times` provisioning attempts.
    #[must_use]
    pub fn failing_provision(self, times: u32) -> Self {
        lock(&self.script).provision_failures = Some(times);
        self
    }

    /// Fails every provisioning attempt.
    #[must_use]
    pub fn always_failing_provision(self) -> Self {
        lock(&self.script).provision_failures = None;
        self
    }

    /// Answers `is_running` with `answers` in order, then with `then`.
    #[must_use]
    pub fn running_sequence(self, answers: &[bool], then: bool) -> Self {
        {
            let mut script = lock(&self.script);
            script.running = answers.iter().copied().collect();
            script.running_default = then;
        }
        self
    }

    /// Makes `is_running` return an error.
    #[must_use]
    pub fn failing_liveness(self) -> Self {
        lock(&self.script).liveness_fails = true;
        self
    }

    /// Makes `deprovision` fail with `message`.
    #[must_use]
    pub fn failing_deprovision(self, message: &str) -> Self {
        lock(&self.script).deprovision_error = Some(message.to_owned());
        self
    }

    /// Makes every `deprovision` call wait `delay` before completing.
    #[must_use]
    pub fn slow_deprovision(self, delay: Duration) -> Self {
        lock(&self.script).deprovision_delay = Some(delay);
        self
    }

    /// Reports `port` from `preferred_port`.
    #[must_use]
    pub fn preferring_port(self, port: u16) -> Self {
        lock(&self.script).preferred_port = Some(port);
        self
    }

    /// Provisioning calls made so far.
    #[must_use]
    pub fn provision_calls(&self) -> Vec<ProvisionCall> {
        lock(&self.script).provision_calls.clone()
    }

    /// Number of liveness queries made so far.
    #[must_use]
    pub fn is_running_calls(&self) -> usize {
        lock(&self.script).is_running_calls
    }

    /// Number of teardown calls made so far.
    #[must_use]
    pub fn deprovision_calls(&self) -> usize {
        lock(&self.script).deprovision_calls
    }
}

impl Backend for ScriptedBackend {
    type Error = ScriptedFailure;

    fn provision<'a>(
        &'a mut self,
        request: &'a ProvisionRequest,
    ) -> BackendFuture<'a, (), ScriptedFailure> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.provision_calls.push(ProvisionCall {
                at: Instant::now(),
                request: request.clone(),
            });
            match script.provision_failures {
                Some(0) => Ok(()),
                Some(remaining) => {
                    script.provision_failures = Some(remaining - 1);
                    Err(ScriptedFailure(String::from("provision refused")))
                }
                None => Err(ScriptedFailure(String::from("provision refused"))),
            }
        })
    }

    fn deprovision(&mut self) -> BackendFuture<'_, (), ScriptedFailure> {
        Box::pin(async move {
            let delay = lock(&self.script).deprovision_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut script = lock(&self.script);
            script.deprovision_calls += 1;
            script
                .deprovision_error
                .clone()
                .map_or(Ok(()), |message| Err(ScriptedFailure(message)))
        })
    }

    fn is_running(&self) -> BackendFuture<'_, bool, ScriptedFailure> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.is_running_calls += 1;
            if script.liveness_fails {
                return Err(ScriptedFailure(String::from("liveness query failed")));
            }
            let fallback = script.running_default;
            Ok(script.running.pop_front().unwrap_or(fallback))
        })
    }

    fn preferred_port(&self) -> Option<u16> {
        lock(&self.script).preferred_port
    }
}

#[derive(Debug, Default)]
struct ProbeScript {
    answers: VecDeque<bool>,
    fallback: bool,
    calls: Vec<(Instant, DaemonEndpoint)>,
}

/// Health probe with scripted answers. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProbe {
    script: Arc<Mutex<ProbeScript>>,
}

impl ScriptedProbe {
    /// Probe that always answers `healthy`.
    #[must_use]
    pub fn always(healthy: bool) -> Self {
        Self::sequence(&[], healthy)
    }

    /// Probe that answers `answers` in order, then `then`.
    #[must_use]
    pub fn sequence(answers: &[bool], then: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(ProbeScript {
                answers: answers.iter().copied().collect(),
                fallback: then,
                calls: Vec::new(),
            })),
        }
    }

    /// Clock readings of every probe made so far.
    #[must_use]
    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.script).calls.iter().map(|(at, _)| *at).collect()
    }

    /// Endpoints probed so far.
    #[must_use]
    pub fn endpoints(&self) -> Vec<DaemonEndpoint> {
        lock(&self.script)
            .calls
            .iter()
            .map(|(_, endpoint)| endpoint.clone())
            .collect()
    }
}

impl HealthProbe for ScriptedProbe {
    fn is_responsive<'a>(&'a self, endpoint: &'a DaemonEndpoint) -> ProbeFuture<'a> {
        Box::pin(async move {
            let mut script = lock(&self.script);
            script.calls.push((Instant::now(), endpoint.clone()));
            let fallback = script.fallback;
            script.answers.pop_front().unwrap_or(fallback)
        })
    }
}

/// Primitive call observed by [`RecordingDevice`].
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    /// `key_down(key)`
    KeyDown(Key),
    /// `key_up(key)`
    KeyUp(Key),
    /// `mouse_move(x, y, duration)`
    MouseMove {
        /// Target column.
        x: i32,
        /// Target row.
        y: i32,
        /// Travel time.
        duration: Duration,
    },
    /// `mouse_scroll(amount)`
    MouseScroll(f64),
    /// `mouse_button_down(button)`
    MouseButtonDown(MouseButton),
    /// `mouse_button_up(button)`
    MouseButtonUp(MouseButton),
}

#[derive(Debug, Default)]
struct DeviceScript {
    calls: Vec<(Instant, DeviceCall)>,
    failing_key_down: BTreeSet<String>,
    failing_key_up: BTreeSet<String>,
}

/// Input device that records primitive calls with their clock readings.
#[derive(Clone, Debug, Default)]
pub struct RecordingDevice {
    script: Arc<Mutex<DeviceScript>>,
}

impl RecordingDevice {
    /// Device on which every primitive succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key_down` fail for `key`.
    pub fn fail_key_down(&self, key: &str) {
        lock(&self.script).failing_key_down.insert(key.to_owned());
    }

    /// Makes `key_up` fail for `key`.
    pub fn fail_key_up(&self, key: &str) {
        lock(&self.script).failing_key_up.insert(key.to_owned());
    }

    /// Calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.script)
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Calls recorded so far with the clock reading of each.
    #[must_use]
    pub fn timeline(&self) -> Vec<(Instant, DeviceCall)> {
        lock(&self.script).calls.clone()
    }

    fn record(&self, call: DeviceCall) -> Result<(), ScriptedFailure> {
        let mut script = lock(&self.script);
        let failing = match &call {
            DeviceCall::KeyDown(key) => script.failing_key_down.contains(key.as_str()),
            DeviceCall::KeyUp(key) => script.failing_key_up.contains(key.as_str()),
            _ => false,
        };
        let description = format!("{call:?}");
        script.calls.push((Instant::now(), call));
        if failing {
            return Err(ScriptedFailure(description));
        }
        Ok(())
    }
}

impl InputDevice for RecordingDevice {
    type Error = ScriptedFailure;

    fn key_down<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::KeyDown(key.clone())) })
    }

    fn key_up<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::KeyUp(key.clone())) })
    }

    fn mouse_move(&self, x: i32, y: i32, duration: Duration) -> DeviceFuture<'_, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::MouseMove { x, y, duration }) })
    }

    fn mouse_scroll(&self, amount: f64) -> DeviceFuture<'_, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::MouseScroll(amount)) })
    }

    fn mouse_button_down(&self, button: MouseButton) -> DeviceFuture<'_, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::MouseButtonDown(button)) })
    }

    fn mouse_button_up(&self, button: MouseButton) -> DeviceFuture<'_, ScriptedFailure> {
        Box::pin(async move { self.record(DeviceCall::MouseButtonUp(button)) })
    }
}
