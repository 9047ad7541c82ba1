//! The call lifecycle controller
//!
//! One [`CallController`] corresponds to one mounted call view. Mounting
//! spawns a task that:
//!
//! 1. waits for the auth collaborator to resolve an identity,
//! 2. fetches a session token for it,
//! 3. runs the [`SessionProvisioner`] for the route's call id,
//! 4. while joined, follows the call's state stream until it reports
//!    `left`, the user leaves, or the view is unmounted.
//!
//! ```text
//!  mount ──► Loading ──(provision ok)──► Live ──(left / leave)──► Closed + navigate
//!               │                          │
//!               │                          └──(unmount)──► Closed (leave + unsubscribe)
//!               └──(provision failed)──► ConnectionError ──(reload)──► navigator.reload()
//! ```
//!
//! Every exit path releases whatever session exists. In particular an
//! unmount that arrives while a join is still pending is remembered, and
//! the session produced by that join is released as soon as it arrives
//! instead of being shown. Unmounting a live call moves the state to
//! `left` without navigating; an unmount before the call went live leaves
//! the state where it was.
//!
//! # Example
//!
//! ```rust,no_run
//! use clgvibe_call_core::{CallConfig, CallController, CallDependencies, CallId, ConnectionState};
//!
//! async fn open_call_page(deps: CallDependencies, route_id: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = CallController::mount(
//!         deps,
//!         CallConfig::new("stream-api-key"),
//!         Some(CallId::new(route_id)),
//!     )?;
//!
//!     controller.wait_for_state(|s| *s == ConnectionState::Joined).await?;
//!     // ... the user hangs up
//!     controller.leave().await?;
//!     controller.unmount().await;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

use clgvibe_infra_common::LogContext;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument, Level};

use crate::capability::CallCapability;
use crate::collaborators::{AuthProvider, AuthState, Navigator, Notifier, TokenProvider};
use crate::config::{CallConfig, ExitTarget};
use crate::error::{CallError, CallResult};
use crate::events::{event_channel, CallEvent, EventStream};
use crate::provisioner::{ProvisionInputs, ProvisionOutcome, SessionProvisioner};
use crate::session::CallSession;
use crate::state::{ConnectionState, StateTracker};
use crate::types::{CallId, CallKind, Identity};

/// Collaborators a controller is mounted with
#[derive(Clone)]
pub struct CallDependencies {
    pub auth: Arc<dyn AuthProvider>,
    pub tokens: Arc<dyn TokenProvider>,
    pub capability: Arc<dyn CallCapability>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

/// What the call page shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallView {
    /// Spinner while idle or joining
    Loading,
    /// Live call surface with controls
    Live(LiveCallView),
    /// Terminal error panel
    ConnectionError(ErrorView),
    /// Nothing; the call ended or the view was unmounted
    Closed,
}

impl CallView {
    pub fn is_live(&self) -> bool {
        matches!(self, CallView::Live(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, CallView::Loading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCallView {
    pub call_id: CallId,
    pub call_kind: CallKind,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub title: String,
    pub message: String,
    pub offers_reload: bool,
}

enum ControllerCommand {
    Leave(oneshot::Sender<CallResult<()>>),
    Reload,
    Unmount,
}

/// Handle to a mounted call view
pub struct CallController {
    call_id: Option<CallId>,
    commands: mpsc::UnboundedSender<ControllerCommand>,
    state: watch::Receiver<ConnectionState>,
    view: watch::Receiver<CallView>,
    events: broadcast::Sender<CallEvent>,
    task: Option<JoinHandle<()>>,
}

impl CallController {
    /// Mount a call view for `call_id` and start provisioning in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(deps: CallDependencies, config: CallConfig, call_id: Option<CallId>) -> CallResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (view_tx, view_rx) = watch::channel(CallView::Loading);
        let events = event_channel();

        let provisioner = Arc::new(SessionProvisioner::new(
            Arc::clone(&deps.capability),
            Arc::clone(&config),
        ));

        let driver = ControllerDriver {
            deps,
            config,
            call_id: call_id.clone(),
            provisioner,
            commands: commands_rx,
            state_tx,
            view_tx,
            events: events.clone(),
            tracker: StateTracker::new(),
            unmount_requested: false,
        };

        let task = tokio::spawn(driver.run());
        info!(call_id = ?call_id, "Call controller mounted");

        Ok(Self {
            call_id,
            commands: commands_tx,
            state: state_rx,
            view: view_rx,
            events,
            task: Some(task),
        })
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call_id.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn view(&self) -> CallView {
        self.view.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn watch_view(&self) -> watch::Receiver<CallView> {
        self.view.clone()
    }

    /// Lifecycle events from now on
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Whether the controller task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait until the connection state satisfies `predicate`
    pub async fn wait_for_state(
        &self,
        predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> CallResult<ConnectionState> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(predicate)
            .await
            .map(|s| *s)
            .map_err(|_| CallError::ControllerGone);
        reached
    }

    /// The live view's leave control. Only valid while joined.
    pub async fn leave(&self) -> CallResult<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(ControllerCommand::Leave(tx))
            .map_err(|_| CallError::ControllerGone)?;
        rx.await.map_err(|_| CallError::ControllerGone)?
    }

    /// The error view's reload action
    pub fn reload(&self) -> CallResult<()> {
        self.commands
            .send(ControllerCommand::Reload)
            .map_err(|_| CallError::ControllerGone)
    }

    /// Unmount the view and wait until every connection it owned is released
    pub async fn unmount(mut self) {
        let _ = self.commands.send(ControllerCommand::Unmount);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Call controller task failed");
            }
        }
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            // Cleanup continues on the detached task
            let _ = self.commands.send(ControllerCommand::Unmount);
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

struct ControllerDriver {
    deps: CallDependencies,
    config: Arc<CallConfig>,
    call_id: Option<CallId>,
    provisioner: Arc<SessionProvisioner>,
    commands: mpsc::UnboundedReceiver<ControllerCommand>,
    state_tx: watch::Sender<ConnectionState>,
    view_tx: watch::Sender<CallView>,
    events: broadcast::Sender<CallEvent>,
    tracker: StateTracker,
    unmount_requested: bool,
}

impl ControllerDriver {
    async fn run(mut self) {
        let call_label = self
            .call_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let span = LogContext::with_operation("call-controller", "lifecycle")
            .with_field("call_id", call_label)
            .span(Level::INFO);

        async {
            self.drive().await;
            self.view_tx.send_replace(CallView::Closed);
            info!(state = %self.tracker.current(), "Call controller stopped");
        }
        .instrument(span)
        .await;
    }

    async fn drive(&mut self) {
        let identity = match self.wait_for_identity().await {
            None => return,
            Some(None) => {
                warn!("Auth source closed before an identity resolved; call stays idle");
                self.idle_until_unmount().await;
                return;
            }
            Some(Some(identity)) => identity,
        };

        let tokens = Arc::clone(&self.deps.tokens);
        let requester = identity.clone();
        let token = match self
            .service_until(async move { tokens.session_token(&requester).await })
            .await
        {
            None => return,
            Some(Ok(token)) => token,
            Some(Err(e)) => {
                warn!(user_id = %identity.id, error = %e, "Session token unavailable; call stays idle");
                self.idle_until_unmount().await;
                return;
            }
        };

        let inputs = ProvisionInputs::new(Some(identity.clone()), Some(token), self.call_id.clone());
        if !inputs.is_ready() {
            debug!("No call id to join; call stays idle");
            self.idle_until_unmount().await;
            return;
        }

        self.advance(ConnectionState::Joining, None);

        match self.await_provisioning(inputs).await {
            Ok(ProvisionOutcome::Provisioned(mut session)) => {
                if self.unmount_requested {
                    info!(call_id = %session.call_id(), "Join completed after unmount; releasing session");
                    if let Err(e) = session.release().await {
                        warn!(error = %e, "Late session did not release cleanly");
                    }
                    self.emit(CallEvent::SessionReleased {
                        call_id: session.call_id().clone(),
                        late_arrival: true,
                    });
                    return;
                }
                self.run_live(session, &identity).await;
            }
            Ok(ProvisionOutcome::Skipped(reason)) => {
                debug!(?reason, "Provisioning skipped");
                if !self.unmount_requested {
                    self.idle_until_unmount().await;
                }
            }
            Err(e) => {
                self.fail(e);
                if !self.unmount_requested {
                    self.idle_until_unmount().await;
                }
            }
        }
    }

    /// `None` on unmount, `Some(None)` if the auth source went away
    async fn wait_for_identity(&mut self) -> Option<Option<Identity>> {
        let mut auth = self.deps.auth.watch_auth();
        let resolved = async move {
            loop {
                let identity = {
                    let state = auth.borrow_and_update();
                    match &*state {
                        AuthState::Authenticated(identity) => Some(identity.clone()),
                        AuthState::Loading => {
                            debug!("Waiting for auth to resolve");
                            None
                        }
                        AuthState::Anonymous => {
                            debug!("No authenticated user; waiting");
                            None
                        }
                    }
                };
                if identity.is_some() {
                    return identity;
                }
                if auth.changed().await.is_err() {
                    return None;
                }
            }
        };
        self.service_until(resolved).await
    }

    /// Drive `fut` while answering commands; `None` if unmounted first
    async fn service_until<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Some(output),
                command = self.commands.recv() => {
                    if let Flow::Stop = self.handle_pending_command(command) {
                        return None;
                    }
                }
            }
        }
    }

    async fn idle_until_unmount(&mut self) {
        self.service_until(std::future::pending::<()>()).await;
    }

    /// Await the provisioner. An unmount in the meantime is recorded, not acted on.
    async fn await_provisioning(&mut self, inputs: ProvisionInputs) -> CallResult<ProvisionOutcome> {
        let provisioner = Arc::clone(&self.provisioner);
        let provisioning = async move { provisioner.provision(&inputs).await };
        tokio::pin!(provisioning);

        loop {
            tokio::select! {
                outcome = &mut provisioning => return outcome,
                command = self.commands.recv(), if !self.unmount_requested => {
                    if let Flow::Stop = self.handle_pending_command(command) {
                        info!("Unmounted while join in flight; session will be released on arrival");
                    }
                }
            }
        }
    }

    /// Commands received while no live session exists
    fn handle_pending_command(&mut self, command: Option<ControllerCommand>) -> Flow {
        match command {
            None | Some(ControllerCommand::Unmount) => {
                self.unmount_requested = true;
                Flow::Stop
            }
            Some(ControllerCommand::Leave(respond_to)) => {
                let current = self.tracker.current();
                let _ = respond_to.send(Err(CallError::invalid_state(format!(
                    "no live call to leave while {}",
                    current
                ))));
                Flow::Continue
            }
            Some(ControllerCommand::Reload) => {
                if self.tracker.current() == ConnectionState::Error {
                    info!("Reloading after connection error");
                    self.deps.navigator.reload();
                } else {
                    debug!(state = %self.tracker.current(), "Reload ignored");
                }
                Flow::Continue
            }
        }
    }

    async fn run_live(&mut self, mut session: CallSession, identity: &Identity) {
        let call_id = session.call_id().clone();

        if let Err(e) = session.subscribe() {
            error!(call_id = %call_id, error = %e, "Could not subscribe to call state");
        }
        self.advance(ConnectionState::Joined, Some(&mut session));
        self.view_tx.send_replace(CallView::Live(LiveCallView {
            call_id: call_id.clone(),
            call_kind: self.config.call_kind.clone(),
            display_name: identity.display_name.clone(),
            joined_at: session.joined_at(),
        }));

        loop {
            tokio::select! {
                notification = session.next_state() => match notification {
                    Some(state) => {
                        self.emit(CallEvent::CallingStateReceived {
                            call_id: call_id.clone(),
                            state,
                        });
                        if state.is_left() {
                            let reason = CallError::UnexpectedDisconnect { call_id: call_id.clone() };
                            info!(call_id = %call_id, reason = %reason, "Call left");
                            session.mark_left_remotely();
                            let _ = self.finish_call(&mut session).await;
                            return;
                        }
                        if state.is_degraded() {
                            warn!(call_id = %call_id, state = ?state, "Call connection degraded");
                        } else {
                            debug!(call_id = %call_id, state = ?state, "Call state notification");
                        }
                    }
                    None => {
                        warn!(call_id = %call_id, "Call state stream closed; treating call as left");
                        let _ = self.finish_call(&mut session).await;
                        return;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ControllerCommand::Leave(respond_to)) => {
                        info!(call_id = %call_id, "Leaving call on user request");
                        let result = self.finish_call(&mut session).await;
                        let _ = respond_to.send(result);
                        return;
                    }
                    Some(ControllerCommand::Reload) => {
                        debug!("Reload ignored while live");
                    }
                    None | Some(ControllerCommand::Unmount) => {
                        info!(call_id = %call_id, "Unmounted while joined; releasing session");
                        self.unmount_requested = true;
                        if let Err(e) = session.release().await {
                            warn!(call_id = %call_id, error = %e, "Session did not release cleanly");
                        }
                        self.emit(CallEvent::SessionReleased {
                            call_id: call_id.clone(),
                            late_arrival: false,
                        });
                        // Unmounting ends the call but is not a navigation
                        self.advance(ConnectionState::Left, Some(&mut session));
                        return;
                    }
                },
            }
        }
    }

    /// Shared end of a live call: release, move to `left`, navigate away
    async fn finish_call(&mut self, session: &mut CallSession) -> CallResult<()> {
        let released = session.release().await;
        self.emit(CallEvent::SessionReleased {
            call_id: session.call_id().clone(),
            late_arrival: false,
        });
        self.advance(ConnectionState::Left, Some(session));
        self.navigate_exit();
        released
    }

    fn fail(&mut self, err: CallError) {
        error!(error = %err, category = err.category(), "Could not initialize call");
        self.advance(ConnectionState::Error, None);

        if !self.unmount_requested {
            self.deps.notifier.notify(&self.config.join_failure_message);
        }

        self.view_tx.send_replace(CallView::ConnectionError(ErrorView {
            title: "Connection Error".to_string(),
            message: self.config.connection_error_message.clone(),
            offers_reload: true,
        }));

        if let Some(call_id) = self.call_id.clone() {
            self.emit(CallEvent::ProvisionFailed {
                call_id,
                reason: err.to_string(),
            });
        }
    }

    fn advance(&mut self, next: ConnectionState, session: Option<&mut CallSession>) -> bool {
        match self.tracker.transition(next) {
            Ok(change) => {
                if let Some(session) = session {
                    session.set_connection_state(next);
                }
                self.state_tx.send_replace(next);
                debug!(from = %change.from, to = %change.to, "Connection state changed");
                self.emit(CallEvent::StateChanged {
                    call_id: self.call_id.clone(),
                    previous: change.from,
                    current: change.to,
                    at: change.at,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "Ignoring connection state transition");
                false
            }
        }
    }

    fn navigate_exit(&self) {
        let target = self.config.exit_target.clone();
        match &target {
            ExitTarget::Route(route) => self.deps.navigator.go_to(route),
            ExitTarget::Back => self.deps.navigator.go_back(),
        }
        self.emit(CallEvent::Navigated { target });
    }

    fn emit(&self, event: CallEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
