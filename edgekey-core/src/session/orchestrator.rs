//! Runs authentication attempts against the VPN client
//!
//! An attempt is a fixed walk through the [`Phase`]s: load credentials,
//! bring the client up, fill in the login form, fetch and enter the one-time
//! code, then wait for the client to report the tunnel. Every step that
//! depends on the client's UI is a bounded poll.
//!
//! Only one attempt runs at a time. A call to [`SessionOrchestrator::start`]
//! while an attempt is in flight joins that attempt instead of starting a
//! second one, and every joined caller sees the same outcome.

use super::{AttemptContext, AttemptGate, Phase, SessionState, StatusPublisher, StatusSnapshot};
use crate::config::{TargetConfig, TimingPolicy};
use crate::driver::{ControlHandle, ExternalAppDriver, Key, PollPolicy};
use crate::error::{AuthError, DriverError};
use crate::probe::ConnectivityProbe;
use crate::prompt::TwoFactorPrompt;
use crate::store::CredentialStore;
use crate::types::{Credentials, OneTimeCode};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Outcome = Result<(), AuthError>;

/// The attempt currently occupying the single-flight slot
struct InFlight {
    attempt_id: u64,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl InFlight {
    fn handle(&self) -> AttemptHandle {
        AttemptHandle {
            attempt_id: self.attempt_id,
            cancel: self.cancel.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

/// A caller's view of a running (or finished) attempt
#[derive(Debug, Clone)]
pub struct AttemptHandle {
    attempt_id: u64,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl AttemptHandle {
    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    /// Ask the attempt to stop at its next suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the attempt to finish
    pub async fn wait(mut self) -> Outcome {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(lost_outcome()),
            },
            Err(_) => Err(lost_outcome()),
        }
    }
}

fn lost_outcome() -> AuthError {
    AuthError::AutomationError {
        detail: "attempt ended without reporting an outcome".to_string(),
    }
}

struct Inner {
    store: CredentialStore,
    driver: Arc<dyn ExternalAppDriver>,
    probe: Arc<dyn ConnectivityProbe>,
    prompt: Arc<dyn TwoFactorPrompt>,
    target: TargetConfig,
    timing: TimingPolicy,
    publisher: StatusPublisher,
    gate: AttemptGate,
    in_flight: Mutex<Option<InFlight>>,
    next_attempt_id: AtomicU64,
}

/// Owns the authentication state machine and its concurrency control
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn new(
        store: CredentialStore,
        driver: Arc<dyn ExternalAppDriver>,
        probe: Arc<dyn ConnectivityProbe>,
        prompt: Arc<dyn TwoFactorPrompt>,
        target: TargetConfig,
        timing: TimingPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                driver,
                probe,
                prompt,
                target,
                timing,
                publisher: StatusPublisher::new(),
                gate: AttemptGate::new(),
                in_flight: Mutex::new(None),
                next_attempt_id: AtomicU64::new(0),
            }),
        }
    }

    /// Start an attempt, or join the one already running
    pub async fn start(&self) -> AttemptHandle {
        let mut slot = self.inner.in_flight.lock().await;
        if let Some(in_flight) = slot.as_ref() {
            debug!(attempt_id = in_flight.attempt_id, "Joining in-flight attempt");
            return in_flight.handle();
        }

        let attempt_id = self.inner.next_attempt_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);

        // A previous success stays visible until the next attempt begins
        if self.inner.publisher.latest().state != SessionState::Idle {
            self.inner.publisher.publish(SessionState::Idle, None, None);
        }
        info!(attempt_id, "Starting authentication attempt");
        self.inner
            .publisher
            .publish(SessionState::Launching, Some(attempt_id), None);

        let in_flight = InFlight {
            attempt_id,
            cancel: cancel.clone(),
            outcome: outcome_rx,
        };
        let handle = in_flight.handle();
        *slot = Some(in_flight);
        drop(slot);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let run = tokio::spawn(inner.clone().execute(attempt_id, cancel));
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AuthError::AutomationError {
                    detail: format!("attempt task failed: {}", e),
                }),
            };
            inner.finish(attempt_id, outcome, outcome_tx).await;
        });

        handle
    }

    /// Run one attempt (or join the running one) to completion
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        self.start().await.wait().await
    }

    /// Cancel the in-flight attempt, if any
    pub async fn cancel(&self) {
        if let Some(in_flight) = self.inner.in_flight.lock().await.as_ref() {
            info!(attempt_id = in_flight.attempt_id, "Cancelling authentication attempt");
            in_flight.cancel.cancel();
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.publisher.latest().state
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.publisher.latest()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_in_progress()
    }

    /// Every snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.inner.publisher.subscribe()
    }

    /// Latest snapshot as a watch channel
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.publisher.watch()
    }

    /// Whether an attempt currently holds the VPN client
    pub fn activity(&self) -> watch::Receiver<bool> {
        self.inner.gate.watch()
    }

    /// Gate shared with background observers of the VPN client
    pub fn gate(&self) -> AttemptGate {
        self.inner.gate.clone()
    }
}

impl Inner {
    #[tracing::instrument(name = "attempt", skip(self, cancel))]
    async fn execute(self: Arc<Self>, attempt_id: u64, cancel: CancellationToken) -> Outcome {
        let _permit = self.gate.enter().await;
        let mut ctx = AttemptContext::new(attempt_id);

        let outcome = self.run_phases(&mut ctx, &cancel).await;

        info!(
            elapsed_secs = ctx.elapsed().as_secs(),
            retries = ctx.total_retries(),
            phase = ?ctx.current_phase(),
            "Attempt finished"
        );
        outcome
    }

    async fn run_phases(&self, ctx: &mut AttemptContext, cancel: &CancellationToken) -> Outcome {
        let permission = self.timing.permission_poll();
        ctx.begin_phase(Phase::Launching, permission.budget());
        let credentials = self.store.load()?.ok_or(AuthError::CredentialsNotFound)?;
        until_cancelled(cancel, self.driver.launch_or_activate(&self.target.bundle_id)).await?;
        self.await_permission(ctx, permission, cancel).await?;

        self.advance(ctx, Phase::AwaitingReadyUI, self.timing.login_poll().budget());
        let (username_field, secret_field) = self.await_login_form(cancel).await?;

        self.advance(ctx, Phase::EnteringCredentials, Duration::ZERO);
        self.enter_credentials(&credentials, &username_field, &secret_field, cancel)
            .await?;
        drop(credentials);

        let code_wait = self.timing.two_factor_settle() + self.timing.two_factor_timeout();
        self.advance(ctx, Phase::AwaitingTwoFactorCode, code_wait);
        let code = self.obtain_code(cancel).await?;

        self.advance(ctx, Phase::EnteringCode, self.timing.code_field_poll().budget());
        self.enter_code(&code, cancel).await?;
        drop(code);

        let connection = self.timing.connection_poll();
        self.advance(ctx, Phase::AwaitingConnection, connection.budget());
        self.await_connection(ctx, connection, cancel).await
    }

    /// Publish the next phase
    fn advance(&self, ctx: &mut AttemptContext, phase: Phase, budget: Duration) {
        let next = phase.state();
        debug_assert!(
            ctx.current_phase()
                .map(Phase::state)
                .is_some_and(|current| current.can_transition_to(&next)),
            "out-of-order transition to {}",
            next
        );
        if ctx.overran() {
            warn!(phase = ?ctx.current_phase(), "Previous phase ran past its budget");
        }
        ctx.begin_phase(phase, budget);
        info!(attempt_id = ctx.attempt_id(), "Phase: {}", phase);
        self.publisher.publish(next, Some(ctx.attempt_id()), None);
    }

    async fn await_permission(
        &self,
        ctx: &mut AttemptContext,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Outcome {
        for attempt in 1..=policy.max_attempts {
            // Only the first check may raise the host's permission dialog
            let check = self.driver.request_automation_permission(attempt == 1);
            if until_cancelled(cancel, check).await? {
                debug!(attempt, "Automation permission granted");
                return Ok(());
            }

            ctx.record_retry();
            warn!(
                "Automation permission not granted (attempt {}/{})",
                attempt, policy.max_attempts
            );
            if attempt < policy.max_attempts {
                pause(policy.interval, cancel).await?;
            }
        }

        Err(AuthError::PermissionDenied {
            attempts: policy.max_attempts,
        })
    }

    async fn await_login_form(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(ControlHandle, ControlHandle), AuthError> {
        let username_field = self
            .driver
            .poll_for_control(&self.target.username_predicate(), self.timing.login_poll(), cancel)
            .await
            .map_err(|e| match e {
                DriverError::ControlNotFound { attempts, .. } => {
                    AuthError::LoginFieldsNotFound { attempts }
                }
                other => other.into(),
            })?;

        // Both fields belong to the same form, so one check suffices
        let secret_predicate = self.target.secret_predicate();
        let secret_field = self
            .driver
            .find_control(&secret_predicate)
            .await?
            .ok_or_else(|| AuthError::ControlNotFound {
                control: secret_predicate.to_string(),
            })?;

        Ok((username_field, secret_field))
    }

    async fn enter_credentials(
        &self,
        credentials: &Credentials,
        username_field: &ControlHandle,
        secret_field: &ControlHandle,
        cancel: &CancellationToken,
    ) -> Outcome {
        ensure_active(cancel)?;
        self.driver
            .set_text(username_field, credentials.username())
            .await?;
        ensure_active(cancel)?;
        self.driver.set_text(secret_field, credentials.secret()).await?;
        ensure_active(cancel)?;

        let submit = self.target.submit_predicate();
        match self.driver.find_control(&submit).await? {
            Some(button) => {
                ensure_active(cancel)?;
                self.driver.invoke(&button).await?;
            }
            None => {
                debug!(control = %submit, "No submit control, pressing Return");
                ensure_active(cancel)?;
                self.driver.press_key(Key::Return).await?;
            }
        }
        info!("Credentials submitted");
        Ok(())
    }

    async fn obtain_code(&self, cancel: &CancellationToken) -> Result<OneTimeCode, AuthError> {
        let settle = self.timing.two_factor_settle();
        if !settle.is_zero() {
            debug!(settle_secs = settle.as_secs(), "Waiting for the code form");
            pause(settle, cancel).await?;
        }

        let timeout = self.timing.two_factor_timeout();
        info!(timeout_secs = timeout.as_secs(), "Requesting one-time code");
        tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            code = self.prompt.request_code(timeout) => Ok(code?),
        }
    }

    async fn enter_code(&self, code: &OneTimeCode, cancel: &CancellationToken) -> Outcome {
        let field = self.target.code_predicate();
        match self
            .driver
            .poll_for_control(&field, self.timing.code_field_poll(), cancel)
            .await
        {
            Ok(handle) => {
                ensure_active(cancel)?;
                self.driver.set_text(&handle, code.expose()).await?;
            }
            Err(DriverError::ControlNotFound { .. }) => {
                warn!(control = %field, "Code field not found, typing into focused control");
                ensure_active(cancel)?;
                self.driver.type_text(code.expose()).await?;
            }
            Err(e) => return Err(e.into()),
        }

        ensure_active(cancel)?;
        let button = match self.target.code_submit_predicate() {
            Some(predicate) => self.driver.find_control(&predicate).await?,
            None => None,
        };
        ensure_active(cancel)?;
        match button {
            Some(button) => self.driver.invoke(&button).await?,
            None => self.driver.press_key(Key::Return).await?,
        }
        info!("One-time code submitted");
        Ok(())
    }

    async fn await_connection(
        &self,
        ctx: &mut AttemptContext,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Outcome {
        for attempt in 1..=policy.max_attempts {
            ensure_active(cancel)?;
            let polled = tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                polled = self.probe.is_connected() => polled,
            };
            match polled {
                Ok(true) => {
                    info!(attempt, "VPN reports connected");
                    return Ok(());
                }
                Ok(false) => debug!(
                    "Not connected yet (attempt {}/{})",
                    attempt, policy.max_attempts
                ),
                Err(e) => warn!(attempt, "Connectivity check failed: {}", e),
            }

            ctx.record_retry();
            if attempt < policy.max_attempts {
                pause(policy.interval, cancel).await?;
            }
        }

        Err(AuthError::ConnectionTimeout {
            seconds: policy.budget().as_secs(),
        })
    }

    /// Publish the terminal state, release the slot, then wake waiters
    async fn finish(
        &self,
        attempt_id: u64,
        outcome: Outcome,
        outcome_tx: watch::Sender<Option<Outcome>>,
    ) {
        let mut slot = self.in_flight.lock().await;
        match &outcome {
            Ok(()) => {
                info!(attempt_id, "Authentication succeeded");
                self.publisher
                    .publish(SessionState::Connected, Some(attempt_id), None);
            }
            Err(e) => {
                error!(attempt_id, "Authentication failed: {}", e);
                self.publisher.publish(
                    SessionState::Failed(e.clone()),
                    Some(attempt_id),
                    Some(e.clone()),
                );
                self.publisher
                    .publish(SessionState::Idle, Some(attempt_id), Some(e.clone()));
            }
        }

        if slot.as_ref().map(|f| f.attempt_id) == Some(attempt_id) {
            *slot = None;
        }
        drop(slot);

        outcome_tx.send_replace(Some(outcome));
    }
}

fn ensure_active(cancel: &CancellationToken) -> Outcome {
    if cancel.is_cancelled() {
        Err(AuthError::Cancelled)
    } else {
        Ok(())
    }
}

/// Await a driver call unless the attempt is cancelled first
async fn until_cancelled<T, E, F>(cancel: &CancellationToken, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AuthError>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        result = call => result.map_err(Into::into),
    }
}

/// Sleep unless the attempt is cancelled first
async fn pause(duration: Duration, cancel: &CancellationToken) -> Outcome {
    tokio::select! {
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
