//! Session provisioning
//!
//! Turns an (identity, token, call id) triple into a joined [`CallSession`]:
//! build a client for the identity and token, get-or-create the call by id,
//! join it.
//!
//! # Guards
//!
//! - Any missing or blank input skips provisioning without touching the
//!   capability.
//! - One triple is provisioned at most once per provisioner.
//! - One join at a time; overlapping calls are skipped.
//!
//! A new triple (e.g. a refreshed token) disconnects the client built for
//! the previous one before anything new is created.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::capability::{CallCapability, ClientHandle, ClientOptions, JoinOptions};
use crate::config::CallConfig;
use crate::error::{CallError, CallResult, CapabilityError};
use crate::session::CallSession;
use crate::types::{AccessToken, CallId, Identity, UserId};

/// Inputs as they become available
#[derive(Debug, Clone, Default)]
pub struct ProvisionInputs {
    pub identity: Option<Identity>,
    pub token: Option<AccessToken>,
    pub call_id: Option<CallId>,
}

impl ProvisionInputs {
    pub fn new(identity: Option<Identity>, token: Option<AccessToken>, call_id: Option<CallId>) -> Self {
        Self {
            identity,
            token,
            call_id,
        }
    }

    /// All three inputs, or [`CallError::IdentityUnavailable`]
    pub fn ready(&self) -> CallResult<(&Identity, &AccessToken, &CallId)> {
        match (&self.identity, &self.token, &self.call_id) {
            (Some(identity), Some(token), Some(call_id))
                if !identity.id.is_empty() && !token.is_empty() && !call_id.is_empty() =>
            {
                Ok((identity, token, call_id))
            }
            _ => Err(CallError::IdentityUnavailable),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready().is_ok()
    }
}

/// Why a provision call did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingInputs,
    AlreadyProvisioned,
    JoinInFlight,
}

#[derive(Debug)]
pub enum ProvisionOutcome {
    Skipped(SkipReason),
    Provisioned(CallSession),
}

impl ProvisionOutcome {
    pub fn into_session(self) -> Option<CallSession> {
        match self {
            ProvisionOutcome::Provisioned(session) => Some(session),
            ProvisionOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProvisionKey {
    user_id: UserId,
    token: AccessToken,
    call_id: CallId,
}

#[derive(Default)]
struct ProvisionerState {
    last_key: Option<ProvisionKey>,
    active_client: Option<Arc<dyn ClientHandle>>,
}

/// Clears the in-flight flag however the join ends, including cancellation
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Provisioning counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

pub struct SessionProvisioner {
    capability: Arc<dyn CallCapability>,
    config: Arc<CallConfig>,
    state: Mutex<ProvisionerState>,
    in_flight: AtomicBool,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl SessionProvisioner {
    pub fn new(capability: Arc<dyn CallCapability>, config: Arc<CallConfig>) -> Self {
        Self {
            capability,
            config,
            state: Mutex::new(ProvisionerState::default()),
            in_flight: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ProvisionStats {
        ProvisionStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Provision a session for `inputs`.
    ///
    /// Returns [`ProvisionOutcome::Skipped`] when a guard applies and
    /// [`CallError::Provision`] when client construction or join fails.
    pub async fn provision(&self, inputs: &ProvisionInputs) -> CallResult<ProvisionOutcome> {
        let (identity, token, call_id) = match inputs.ready() {
            Ok(ready) => ready,
            Err(CallError::IdentityUnavailable) => {
                debug!("Provisioning deferred until identity, token and call id are available");
                return Ok(ProvisionOutcome::Skipped(SkipReason::MissingInputs));
            }
            Err(e) => return Err(e),
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(call_id = %call_id, "Join already in flight; ignoring provision request");
            return Ok(ProvisionOutcome::Skipped(SkipReason::JoinInFlight));
        }
        let _in_flight = InFlightGuard(&self.in_flight);

        let key = ProvisionKey {
            user_id: identity.id.clone(),
            token: token.clone(),
            call_id: call_id.clone(),
        };

        let previous = {
            let mut state = self.state.lock();
            if state.last_key.as_ref() == Some(&key) {
                debug!(call_id = %call_id, user_id = %identity.id, "Triple already provisioned");
                return Ok(ProvisionOutcome::Skipped(SkipReason::AlreadyProvisioned));
            }
            state.last_key = Some(key);
            state.active_client.take()
        };

        if let Some(previous) = previous {
            info!(user_id = %previous.user_id(), "Disconnecting client of previous provisioning");
            if let Err(e) = previous.disconnect().await {
                warn!(error = %e, "Previous client did not disconnect cleanly");
            }
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        info!(call_id = %call_id, user_id = %identity.id, kind = %self.config.call_kind, "Initializing call client");

        match self.connect(identity, token, call_id).await {
            Ok(session) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.state.lock().active_client = Some(session.client());
                info!(call_id = %call_id, "Joined call successfully");
                Ok(ProvisionOutcome::Provisioned(session))
            }
            Err(cause) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(call_id = %call_id, error = %cause, "Error joining call");
                Err(CallError::provision(call_id.clone(), cause))
            }
        }
    }

    async fn connect(
        &self,
        identity: &Identity,
        token: &AccessToken,
        call_id: &CallId,
    ) -> Result<CallSession, CapabilityError> {
        let client = self
            .capability
            .create_client(ClientOptions {
                api_key: self.config.api_key.clone(),
                identity: identity.clone(),
                token: token.clone(),
            })
            .await?;

        let call = client.call(&self.config.call_kind, call_id);
        let options = JoinOptions {
            create: self.config.create_if_missing,
        };

        let joined = match self.config.join_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call.join(options)).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::Timeout {
                    duration_ms: limit.as_millis() as u64,
                }),
            },
            None => call.join(options).await,
        };

        if let Err(e) = joined {
            if let Err(disconnect_err) = client.disconnect().await {
                warn!(call_id = %call_id, error = %disconnect_err, "Client disconnect after failed join also failed");
            }
            return Err(e);
        }

        Ok(CallSession::new(client, call))
    }
}
