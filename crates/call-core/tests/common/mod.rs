//! Common test helpers for call-core
//!
//! An in-memory call capability that keeps call resources keyed by cid,
//! tracks participants and subscribers, and counts every connection-level
//! operation so tests can assert that nothing leaks. Plus recording
//! notifier/navigator collaborators and a canned token provider.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use uuid::Uuid;

use clgvibe_call_core::{
    call_cid, AccessToken, AuthState, CallCapability, CallConfig, CallController, CallDependencies,
    CallError, CallHandle, CallId, CallKind, CallResult, CallingState, CapabilityError, ClientHandle,
    ClientOptions, Identity, JoinOptions, Navigator, Notifier, StateSubscription, TokenProvider,
    UserId, WatchAuthProvider,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("clgvibe_call_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn ann() -> Identity {
    Identity::new("u1", "Ann")
}

pub fn bob() -> Identity {
    Identity::new("u2", "Bob")
}

pub fn config() -> CallConfig {
    CallConfig::new("test-api-key")
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[derive(Debug, Default)]
struct Counters {
    clients_created: AtomicUsize,
    disconnects: AtomicUsize,
    joins: AtomicUsize,
    leaves: AtomicUsize,
    subscriptions: AtomicUsize,
    unsubscribes: AtomicUsize,
    resources_created: AtomicUsize,
}

#[derive(Default)]
struct Resource {
    participants: HashSet<UserId>,
    subscribers: HashMap<Uuid, (UserId, mpsc::UnboundedSender<CallingState>)>,
    /// Last state emitted for the call, replayed to new subscribers
    current: Option<CallingState>,
}

struct Inner {
    resources: Mutex<HashMap<String, Resource>>,
    counters: Counters,
    fail_client: AtomicBool,
    fail_join: AtomicBool,
    end_on_join: AtomicBool,
    gate: watch::Sender<bool>,
    join_started: Notify,
    client_tokens: Mutex<Vec<(UserId, String)>>,
}

/// In-memory stand-in for the hosted call infrastructure
#[derive(Clone)]
pub struct FakeCapability {
    inner: Arc<Inner>,
}

impl FakeCapability {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                resources: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                fail_client: AtomicBool::new(false),
                fail_join: AtomicBool::new(false),
                end_on_join: AtomicBool::new(false),
                gate,
                join_started: Notify::new(),
                client_tokens: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn clients_created(&self) -> usize {
        self.inner.counters.clients_created.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.counters.disconnects.load(Ordering::SeqCst)
    }

    pub fn joins(&self) -> usize {
        self.inner.counters.joins.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> usize {
        self.inner.counters.leaves.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> usize {
        self.inner.counters.subscriptions.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.inner.counters.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn resources_created(&self) -> usize {
        self.inner.counters.resources_created.load(Ordering::SeqCst)
    }

    pub fn fail_client_creation(&self, fail: bool) {
        self.inner.fail_client.store(fail, Ordering::SeqCst);
    }

    pub fn fail_joins(&self, fail: bool) {
        self.inner.fail_join.store(fail, Ordering::SeqCst);
    }

    /// The call ends (`left`) as soon as a join completes, before anyone
    /// has subscribed
    pub fn end_calls_on_join(&self, end: bool) {
        self.inner.end_on_join.store(end, Ordering::SeqCst);
    }

    /// Joins block until [`FakeCapability::release_joins`]
    pub fn hold_joins(&self) {
        self.inner.gate.send_replace(false);
    }

    pub fn release_joins(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Resolves once a join has reached the capability
    pub async fn join_started(&self) {
        self.inner.join_started.notified().await;
    }

    pub fn resource_count(&self) -> usize {
        self.inner.resources.lock().len()
    }

    pub fn participants(&self, cid: &str) -> Vec<UserId> {
        let resources = self.inner.resources.lock();
        let mut participants: Vec<UserId> = resources
            .get(cid)
            .map(|r| r.participants.iter().cloned().collect())
            .unwrap_or_default();
        participants.sort();
        participants
    }

    pub fn subscriber_count(&self, cid: &str) -> usize {
        self.inner
            .resources
            .lock()
            .get(cid)
            .map(|r| r.subscribers.len())
            .unwrap_or(0)
    }

    /// Tokens clients were built with, in order
    pub fn client_tokens(&self) -> Vec<(UserId, String)> {
        self.inner.client_tokens.lock().clone()
    }

    /// Push a calling state to every subscriber of `cid`
    pub fn emit(&self, cid: &str, state: CallingState) -> usize {
        let mut resources = self.inner.resources.lock();
        let Some(resource) = resources.get_mut(cid) else {
            return 0;
        };
        resource.current = Some(state);
        resource
            .subscribers
            .values()
            .filter(|(_, tx)| tx.send(state).is_ok())
            .count()
    }

    /// Close every subscriber stream of `cid` without a final state
    pub fn close_streams(&self, cid: &str) {
        if let Some(resource) = self.inner.resources.lock().get_mut(cid) {
            resource.subscribers.clear();
        }
    }
}

#[async_trait]
impl CallCapability for FakeCapability {
    async fn create_client(
        &self,
        options: ClientOptions,
    ) -> Result<Arc<dyn ClientHandle>, CapabilityError> {
        if self.inner.fail_client.load(Ordering::SeqCst) {
            return Err(CapabilityError::unauthorized("token rejected"));
        }

        self.inner.counters.clients_created.fetch_add(1, Ordering::SeqCst);
        self.inner
            .client_tokens
            .lock()
            .push((options.identity.id.clone(), options.token.expose().to_string()));

        Ok(Arc::new(FakeClient {
            inner: Arc::clone(&self.inner),
            user_id: options.identity.id,
            disconnected: AtomicBool::new(false),
        }))
    }
}

struct FakeClient {
    inner: Arc<Inner>,
    user_id: UserId,
    disconnected: AtomicBool,
}

#[async_trait]
impl ClientHandle for FakeClient {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn call(&self, kind: &CallKind, call_id: &CallId) -> Arc<dyn CallHandle> {
        Arc::new(FakeCall {
            inner: Arc::clone(&self.inner),
            kind: kind.clone(),
            id: call_id.clone(),
            user_id: self.user_id.clone(),
        })
    }

    async fn disconnect(&self) -> Result<(), CapabilityError> {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            self.inner.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FakeCall {
    inner: Arc<Inner>,
    kind: CallKind,
    id: CallId,
    user_id: UserId,
}

#[async_trait]
impl CallHandle for FakeCall {
    fn kind(&self) -> &CallKind {
        &self.kind
    }

    fn id(&self) -> &CallId {
        &self.id
    }

    async fn join(&self, options: JoinOptions) -> Result<(), CapabilityError> {
        self.inner.counters.joins.fetch_add(1, Ordering::SeqCst);
        self.inner.join_started.notify_one();

        let mut gate = self.inner.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.inner.fail_join.load(Ordering::SeqCst) {
            return Err(CapabilityError::network("media server unreachable"));
        }

        let cid = call_cid(&self.kind, &self.id);
        let mut resources = self.inner.resources.lock();
        if !resources.contains_key(&cid) {
            if !options.create {
                return Err(CapabilityError::conflict(format!("call {} does not exist", cid)));
            }
            self.inner.counters.resources_created.fetch_add(1, Ordering::SeqCst);
        }
        let resource = resources.entry(cid).or_default();
        resource.participants.insert(self.user_id.clone());
        resource.current = None;
        if self.inner.end_on_join.load(Ordering::SeqCst) {
            resource.current = Some(CallingState::Left);
        }
        Ok(())
    }

    async fn leave(&self) -> Result<(), CapabilityError> {
        self.inner.counters.leaves.fetch_add(1, Ordering::SeqCst);
        let cid = call_cid(&self.kind, &self.id);
        if let Some(resource) = self.inner.resources.lock().get_mut(&cid) {
            resource.participants.remove(&self.user_id);
        }
        Ok(())
    }

    fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber_id = Uuid::new_v4();
        let cid = call_cid(&self.kind, &self.id);

        self.inner.counters.subscriptions.fetch_add(1, Ordering::SeqCst);
        {
            let mut resources = self.inner.resources.lock();
            let resource = resources.entry(cid.clone()).or_default();
            if let Some(current) = resource.current {
                let _ = tx.send(current);
            }
            resource.subscribers.insert(subscriber_id, (self.user_id.clone(), tx));
        }

        let inner = Arc::clone(&self.inner);
        StateSubscription::new(rx, move || {
            inner.counters.unsubscribes.fetch_add(1, Ordering::SeqCst);
            if let Some(resource) = inner.resources.lock().get_mut(&cid) {
                resource.subscribers.remove(&subscriber_id);
            }
        })
    }
}

/// Hands out one fixed token, or always fails
pub struct StaticTokenProvider {
    token: Option<String>,
    calls: AtomicUsize,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn session_token(&self, _identity: &Identity) -> CallResult<AccessToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.token {
            Some(token) => Ok(AccessToken::new(token.clone())),
            None => Err(CallError::token("token endpoint returned 500")),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    GoTo(String),
    Back,
    Reload,
}

#[derive(Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<NavEvent>>,
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<NavEvent> {
        self.events.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn go_to(&self, route: &str) {
        self.events.lock().push(NavEvent::GoTo(route.to_string()));
    }

    fn go_back(&self) {
        self.events.lock().push(NavEvent::Back);
    }

    fn reload(&self) {
        self.events.lock().push(NavEvent::Reload);
    }
}

/// Everything a controller is mounted with, kept around for assertions
pub struct Harness {
    pub capability: FakeCapability,
    pub auth: Arc<WatchAuthProvider>,
    pub tokens: Arc<StaticTokenProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    /// Ann is signed in and the token endpoint returns `tok-abc`
    pub fn new() -> Self {
        Self::with(AuthState::Authenticated(ann()), StaticTokenProvider::new("tok-abc"))
    }

    pub fn with(auth: AuthState, tokens: StaticTokenProvider) -> Self {
        init_tracing();
        Self {
            capability: FakeCapability::new(),
            auth: Arc::new(WatchAuthProvider::new(auth)),
            tokens: Arc::new(tokens),
            notifier: Arc::new(RecordingNotifier::default()),
            navigator: Arc::new(RecordingNavigator::default()),
        }
    }

    pub fn deps(&self) -> CallDependencies {
        CallDependencies {
            auth: self.auth.clone(),
            tokens: self.tokens.clone(),
            capability: Arc::new(self.capability.clone()),
            notifier: self.notifier.clone(),
            navigator: self.navigator.clone(),
        }
    }

    pub fn mount(&self, call_id: Option<&str>) -> CallController {
        self.mount_with(config(), call_id)
    }

    pub fn mount_with(&self, config: CallConfig, call_id: Option<&str>) -> CallController {
        CallController::mount(self.deps(), config, call_id.map(CallId::new))
            .expect("valid test config")
    }
}
