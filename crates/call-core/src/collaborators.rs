//! Collaborators the controller depends on but does not implement
//!
//! Authentication, token issuing, user-facing alerts and navigation all
//! belong to the surrounding application. They are injected as trait
//! objects so the controller can be driven by fakes in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::error::CallResult;
use crate::types::{AccessToken, Identity, UserId};

/// What the auth collaborator currently knows about the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Still resolving; the controller must not provision yet
    Loading,
    /// Resolved, nobody logged in
    Anonymous,
    /// Resolved to a user
    Authenticated(Identity),
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Source of the current identity
pub trait AuthProvider: Send + Sync {
    /// A receiver that always holds the latest [`AuthState`]
    fn watch_auth(&self) -> watch::Receiver<AuthState>;
}

/// Auth provider backed by a watch channel the application updates
#[derive(Debug)]
pub struct WatchAuthProvider {
    sender: watch::Sender<AuthState>,
}

impl WatchAuthProvider {
    pub fn new(initial: AuthState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn set(&self, state: AuthState) {
        self.sender.send_replace(state);
    }
}

impl AuthProvider for WatchAuthProvider {
    fn watch_auth(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }
}

/// Issues call-capability tokens for an identity
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn session_token(&self, identity: &Identity) -> CallResult<AccessToken>;
}

/// Caches tokens per user so repeated mounts in one session reuse them
pub struct CachedTokenProvider<P> {
    inner: P,
    cache: DashMap<UserId, AccessToken>,
}

impl<P: TokenProvider> CachedTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Forget the cached token for `user_id`
    pub fn invalidate(&self, user_id: &UserId) -> bool {
        self.cache.remove(user_id).is_some()
    }

    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachedTokenProvider<P> {
    async fn session_token(&self, identity: &Identity) -> CallResult<AccessToken> {
        if let Some(token) = self.cache.get(&identity.id) {
            debug!(user_id = %identity.id, "Using cached session token");
            return Ok(token.value().clone());
        }

        let token = self.inner.session_token(identity).await?;
        self.cache.insert(identity.id.clone(), token.clone());
        Ok(token)
    }
}

/// Fire-and-forget user-facing alerts
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only logs; useful for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notification = message, "User notification");
    }
}

/// Application navigation
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn go_to(&self, route: &str);

    fn go_back(&self);

    /// Full reload of the current page
    fn reload(&self);
}
