//! An established connection to one call resource
//!
//! A [`CallSession`] owns the client/call pair produced by the provisioner
//! plus the state subscription the controller opens on it. Those handles
//! are live network connections, so a session must be released exactly
//! once: [`CallSession::release`] unsubscribes, leaves the call (unless
//! the capability already reported `left`) and disconnects the client.
//! A session dropped without being released schedules the same cleanup on
//! the current runtime.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::{CallHandle, ClientHandle, StateSubscription};
use crate::error::{CallError, CallResult};
use crate::state::{CallingState, ConnectionState};
use crate::types::{CallId, UserId};

pub struct CallSession {
    client: Arc<dyn ClientHandle>,
    call: Arc<dyn CallHandle>,
    subscription: Option<StateSubscription>,
    connection_state: ConnectionState,
    joined_at: DateTime<Utc>,
    left_remotely: bool,
    released: bool,
}

impl CallSession {
    /// Wrap a freshly joined client/call pair
    pub(crate) fn new(client: Arc<dyn ClientHandle>, call: Arc<dyn CallHandle>) -> Self {
        Self {
            client,
            call,
            subscription: None,
            connection_state: ConnectionState::Joining,
            joined_at: Utc::now(),
            left_remotely: false,
            released: false,
        }
    }

    pub fn client(&self) -> Arc<dyn ClientHandle> {
        Arc::clone(&self.client)
    }

    pub fn call(&self) -> Arc<dyn CallHandle> {
        Arc::clone(&self.call)
    }

    pub fn call_id(&self) -> &CallId {
        self.call.id()
    }

    pub fn user_id(&self) -> &UserId {
        self.client.user_id()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(StateSubscription::is_active)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Open the state subscription. A session subscribes at most once.
    pub fn subscribe(&mut self) -> CallResult<()> {
        if self.released {
            return Err(CallError::invalid_state("session already released"));
        }
        if self.subscription.is_some() {
            return Err(CallError::invalid_state("session already subscribed"));
        }

        let subscription = self.call.subscribe();
        debug!(call_id = %self.call_id(), subscription_id = %subscription.id(), "Subscribed to call state");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Next calling-state notification; `None` when there is no open subscription
    /// or the capability closed the stream
    pub async fn next_state(&mut self) -> Option<CallingState> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => None,
        }
    }

    /// Record that the capability already ended the call, so release skips `leave`
    pub(crate) fn mark_left_remotely(&mut self) {
        self.left_remotely = true;
    }

    /// Unsubscribe, leave and disconnect. Runs once; later calls are no-ops.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub async fn release(&mut self) -> CallResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let call_id = self.call_id().clone();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        let mut outcome = Ok(());

        if !self.left_remotely {
            if let Err(e) = self.call.leave().await {
                warn!(call_id = %call_id, error = %e, "Failed to leave call during release");
                outcome = Err(CallError::from(e));
            }
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(call_id = %call_id, error = %e, "Failed to disconnect client during release");
            if outcome.is_ok() {
                outcome = Err(CallError::from(e));
            }
        }

        info!(call_id = %call_id, left_remotely = self.left_remotely, "Call session released");
        outcome
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        let call_id = self.call_id().clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(call_id = %call_id, "Call session dropped outside a runtime; connection not released");
            return;
        };

        warn!(call_id = %call_id, "Call session dropped without release; releasing in background");
        let call = Arc::clone(&self.call);
        let client = Arc::clone(&self.client);
        let leave = !self.left_remotely;
        runtime.spawn(async move {
            if leave {
                if let Err(e) = call.leave().await {
                    warn!(call_id = %call_id, error = %e, "Background leave failed");
                }
            }
            if let Err(e) = client.disconnect().await {
                warn!(call_id = %call_id, error = %e, "Background disconnect failed");
            }
        });
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("cid", &self.call.cid())
            .field("user_id", self.client.user_id())
            .field("connection_state", &self.connection_state)
            .field("subscribed", &self.is_subscribed())
            .field("released", &self.released)
            .finish()
    }
}
