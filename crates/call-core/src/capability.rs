//! The hosted call capability, seen from our side
//!
//! The video infrastructure is opaque. All we rely on is:
//!
//! - [`CallCapability::create_client`] - a client scoped to one identity and token
//! - [`ClientHandle::call`] - a handle to a named call resource (get-or-create)
//! - [`CallHandle::join`] / [`CallHandle::leave`]
//! - [`CallHandle::subscribe`] - an ordered stream of [`CallingState`] values
//!
//! Implementations must deliver state notifications in emission order and
//! must not coalesce them. A new subscription starts with the call's
//! current state when one is known, so a `left` that happened before
//! subscribing is still seen.
//!
//! ```rust
//! use clgvibe_call_core::{CallingState, StateSubscription};
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let (tx, rx) = mpsc::unbounded_channel();
//! let mut subscription = StateSubscription::new(rx, || {});
//! tx.send(CallingState::Joined).unwrap();
//!
//! assert_eq!(subscription.next().await, Some(CallingState::Joined));
//! assert!(subscription.unsubscribe());
//! assert_eq!(subscription.next().await, None);
//! # });
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::CapabilityError;
use crate::state::CallingState;
use crate::types::{call_cid, AccessToken, CallId, CallKind, Identity, UserId};

/// Everything needed to build a client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub identity: Identity,
    pub token: AccessToken,
}

/// Options for [`CallHandle::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    /// Create the call resource if it does not exist yet
    pub create: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self { create: true }
    }
}

/// Entry point of the hosted call infrastructure
#[async_trait]
pub trait CallCapability: Send + Sync {
    /// Build a client for one identity + token pair
    async fn create_client(
        &self,
        options: ClientOptions,
    ) -> Result<Arc<dyn ClientHandle>, CapabilityError>;
}

/// A connected client
#[async_trait]
pub trait ClientHandle: Send + Sync {
    /// User this client acts for
    fn user_id(&self) -> &UserId;

    /// Handle to the call resource `kind:call_id`.
    ///
    /// No network traffic happens here; the resource is created (if at all)
    /// on [`CallHandle::join`].
    fn call(&self, kind: &CallKind, call_id: &CallId) -> Arc<dyn CallHandle>;

    /// Close the client connection. Must be idempotent.
    async fn disconnect(&self) -> Result<(), CapabilityError>;
}

/// A handle to one call resource
#[async_trait]
pub trait CallHandle: Send + Sync {
    fn kind(&self) -> &CallKind;

    fn id(&self) -> &CallId;

    /// Fully qualified id. Two handles with the same cid refer to the same call.
    fn cid(&self) -> String {
        call_cid(self.kind(), self.id())
    }

    async fn join(&self, options: JoinOptions) -> Result<(), CapabilityError>;

    async fn leave(&self) -> Result<(), CapabilityError>;

    /// Subscribe to calling-state notifications for this handle.
    ///
    /// The first item is the call's current [`CallingState`] if the
    /// capability has one; later items follow in emission order.
    fn subscribe(&self) -> StateSubscription;
}

type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// A cancellable subscription to a call's state stream.
///
/// The cancel callback runs at most once: on [`StateSubscription::unsubscribe`]
/// or, failing that, on drop.
pub struct StateSubscription {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<CallingState>,
    cancel: Option<CancelFn>,
}

impl StateSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<CallingState>,
        cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            receiver,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Next notification, or `None` once unsubscribed or the stream closed
    pub async fn next(&mut self) -> Option<CallingState> {
        if self.cancel.is_none() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Cancel the subscription. Returns `false` if it was already cancelled.
    pub fn unsubscribe(&mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => {
                self.receiver.close();
                cancel();
                tracing::debug!(subscription_id = %self.id, "Unsubscribed from call state stream");
                true
            }
            None => false,
        }
    }
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for StateSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
