//! Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use edgekey_core::config::{TargetConfig, TimingPolicy};
use edgekey_core::driver::{ControlHandle, ControlPredicate, ExternalAppDriver, Key};
use edgekey_core::error::{DriverError, ProbeError};
use edgekey_core::probe::ConnectivityProbe;
use edgekey_core::prompt::{ChannelPrompt, CodeExpectation, CodeRequest};
use edgekey_core::session::SessionOrchestrator;
use edgekey_core::store::{CredentialStore, MemoryBackend};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One call made against the fake driver
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Launch(String),
    Permission { prompt: bool },
    Find(ControlPredicate),
    SetText { control: ControlPredicate, value: String },
    Invoke(ControlPredicate),
    PressKey(Key),
    TypeText(String),
}

impl Call {
    /// Synthesized input, as opposed to observation
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Call::SetText { .. } | Call::Invoke(_) | Call::PressKey(_) | Call::TypeText(_)
        )
    }
}

/// Driver that simulates the VPN client's login window
pub struct FakeDriver {
    calls: Mutex<Vec<(Instant, Call)>>,
    checks: Mutex<HashMap<ControlPredicate, u32>>,
    login_field: ControlPredicate,
    login_form_on: u32,
    hidden: HashSet<ControlPredicate>,
    permission_granted_on: u32,
    permission_checks: AtomicU32,
    installed: bool,
    launch_hangs: bool,
}

impl FakeDriver {
    /// Login form visible on the first check, permission already granted
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            checks: Mutex::new(HashMap::new()),
            login_field: TargetConfig::default().username_predicate(),
            login_form_on: 1,
            hidden: HashSet::new(),
            permission_granted_on: 1,
            permission_checks: AtomicU32::new(0),
            installed: true,
            launch_hangs: false,
        }
    }

    /// Make the login form appear on the `n`th check (`u32::MAX` for never)
    pub fn login_form_on(mut self, n: u32) -> Self {
        self.login_form_on = n;
        self
    }

    /// Never show controls matching `predicate`
    pub fn without(mut self, predicate: ControlPredicate) -> Self {
        self.hidden.insert(predicate);
        self
    }

    /// Grant automation permission on the `n`th check (`u32::MAX` for never)
    pub fn permission_granted_on(mut self, n: u32) -> Self {
        self.permission_granted_on = n;
        self
    }

    pub fn not_installed(mut self) -> Self {
        self.installed = false;
        self
    }

    /// Launch never returns, like an `open` call stuck behind a dialog
    pub fn launch_hangs(mut self) -> Self {
        self.launch_hangs = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// When `call` was first made
    pub fn time_of(&self, call: &Call) -> Option<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(_, made)| made == call)
            .map(|(at, _)| *at)
    }

    pub fn launches(&self) -> usize {
        self.count(|c| matches!(c, Call::Launch(_)))
    }

    pub fn inputs(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_input).collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(*c)).count()
    }

    /// Values typed with `set_text`, in order
    pub fn texts(&self) -> Vec<(ControlPredicate, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetText { control, value } => Some((control, value)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl ExternalAppDriver for FakeDriver {
    async fn launch_or_activate(&self, app_id: &str) -> Result<(), DriverError> {
        self.record(Call::Launch(app_id.to_string()));
        if self.launch_hangs {
            std::future::pending::<()>().await;
        }
        if !self.installed {
            return Err(DriverError::ApplicationNotFound {
                app: app_id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_control(
        &self,
        predicate: &ControlPredicate,
    ) -> Result<Option<ControlHandle>, DriverError> {
        self.record(Call::Find(predicate.clone()));
        let check = {
            let mut checks = self.checks.lock().unwrap();
            let count = checks.entry(predicate.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if self.hidden.contains(predicate) {
            return Ok(None);
        }
        if *predicate == self.login_field && check < self.login_form_on {
            return Ok(None);
        }
        Ok(Some(ControlHandle::new(predicate.clone())))
    }

    async fn set_text(&self, control: &ControlHandle, value: &str) -> Result<(), DriverError> {
        self.record(Call::SetText {
            control: control.predicate().clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn invoke(&self, control: &ControlHandle) -> Result<(), DriverError> {
        self.record(Call::Invoke(control.predicate().clone()));
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), DriverError> {
        self.record(Call::PressKey(key));
        Ok(())
    }

    async fn type_text(&self, value: &str) -> Result<(), DriverError> {
        self.record(Call::TypeText(value.to_string()));
        Ok(())
    }

    async fn request_automation_permission(&self, prompt: bool) -> Result<bool, DriverError> {
        self.record(Call::Permission { prompt });
        let check = self.permission_checks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(check >= self.permission_granted_on)
    }
}

/// Probe that reports connected from the `n`th poll on
pub struct FakeProbe {
    connected_on: u32,
    failing_until: u32,
    polls: Mutex<Vec<Instant>>,
}

impl FakeProbe {
    pub fn connected_on(n: u32) -> Self {
        Self {
            connected_on: n,
            failing_until: 0,
            polls: Mutex::new(Vec::new()),
        }
    }

    pub fn never() -> Self {
        Self::connected_on(u32::MAX)
    }

    /// Fail the first `n` polls with an error
    pub fn failing_first(mut self, n: u32) -> Self {
        self.failing_until = n;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectivityProbe for FakeProbe {
    async fn is_connected(&self) -> Result<bool, ProbeError> {
        let poll = {
            let mut polls = self.polls.lock().unwrap();
            polls.push(Instant::now());
            polls.len() as u32
        };
        if poll <= self.failing_until {
            return Err(ProbeError::Unavailable {
                reason: "client not responding".to_string(),
            });
        }
        Ok(poll >= self.connected_on)
    }
}

/// Prompt whose UI answers every request with `code`
pub fn answering_prompt(code: &'static str) -> Arc<ChannelPrompt> {
    let (prompt, mut requests) = ChannelPrompt::new(CodeExpectation::default());
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            request.respond(code);
        }
    });
    Arc::new(prompt)
}

/// Prompt whose UI never answers; keep the receiver alive for the test
pub fn silent_prompt() -> (Arc<ChannelPrompt>, mpsc::Receiver<CodeRequest>) {
    let (prompt, requests) = ChannelPrompt::new(CodeExpectation::default());
    (Arc::new(prompt), requests)
}

pub fn store_with(username: &str, secret: &str) -> CredentialStore {
    let store = CredentialStore::new(Arc::new(MemoryBackend::default()));
    store.save(username, secret).unwrap();
    store
}

pub fn empty_store() -> CredentialStore {
    CredentialStore::new(Arc::new(MemoryBackend::default()))
}

/// Default timings without the settle delay
pub fn quick_timing() -> TimingPolicy {
    TimingPolicy {
        two_factor_settle_secs: 0,
        ..TimingPolicy::default()
    }
}

pub fn orchestrator(
    store: CredentialStore,
    driver: Arc<FakeDriver>,
    probe: Arc<FakeProbe>,
    prompt: Arc<ChannelPrompt>,
    timing: TimingPolicy,
) -> SessionOrchestrator {
    SessionOrchestrator::new(
        store,
        driver,
        probe,
        prompt,
        TargetConfig::default(),
        timing,
    )
}
