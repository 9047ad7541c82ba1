//! In-memory social backend for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use clgvibe_call_core::UserId;
use clgvibe_social_core::{
    FriendRequest, FriendRequests, RequestId, SocialApi, SocialError, SocialResult, UserProfile,
};

#[derive(Default)]
struct Backend {
    users: BTreeMap<UserId, UserProfile>,
    friendships: BTreeSet<(UserId, UserId)>,
    requests: Vec<FriendRequest>,
    next_request: u32,
}

impl Backend {
    fn are_friends(&self, a: &UserId, b: &UserId) -> bool {
        self.friendships.contains(&(a.clone(), b.clone())) || self.friendships.contains(&(b.clone(), a.clone()))
    }

    fn profile(&self, id: &UserId) -> SocialResult<UserProfile> {
        self.users
            .get(id)
            .cloned()
            .ok_or_else(|| SocialError::not_found(format!("user {}", id)))
    }
}

/// The backend as seen by user `me`
pub struct FakeSocialApi {
    me: UserId,
    backend: Mutex<Backend>,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_recommendations: AtomicBool,
}

impl FakeSocialApi {
    pub fn new(me: UserProfile) -> Self {
        let mut backend = Backend::default();
        let id = me.id.clone();
        backend.users.insert(id.clone(), me);
        Self {
            me: id,
            backend: Mutex::new(backend),
            calls: Mutex::new(HashMap::new()),
            fail_recommendations: AtomicBool::new(false),
        }
    }

    pub fn add_user(&self, profile: UserProfile) -> &Self {
        self.backend.lock().users.insert(profile.id.clone(), profile);
        self
    }

    pub fn befriend(&self, other: &str) -> &Self {
        self.backend
            .lock()
            .friendships
            .insert((self.me.clone(), UserId::new(other)));
        self
    }

    /// A pending request from `sender` to the current user
    pub fn incoming_from(&self, sender: &str) -> RequestId {
        let mut backend = self.backend.lock();
        backend.next_request += 1;
        let id = RequestId::new(format!("req-{}", backend.next_request));
        let request = FriendRequest {
            id: id.clone(),
            sender: backend.users[&UserId::new(sender)].clone(),
            recipient: backend.users[&self.me].clone(),
            created_at: Some(Utc::now()),
        };
        backend.requests.push(request);
        id
    }

    pub fn fail_recommendations(&self, fail: bool) {
        self.fail_recommendations.store(fail, Ordering::SeqCst);
    }

    /// How often `endpoint` was called
    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().get(endpoint).copied().unwrap_or(0)
    }

    fn record(&self, endpoint: &'static str) {
        *self.calls.lock().entry(endpoint).or_insert(0) += 1;
    }
}

#[async_trait]
impl SocialApi for FakeSocialApi {
    async fn friends(&self) -> SocialResult<Vec<UserProfile>> {
        self.record("friends");
        let backend = self.backend.lock();
        Ok(backend
            .users
            .values()
            .filter(|user| user.id != self.me && backend.are_friends(&self.me, &user.id))
            .cloned()
            .collect())
    }

    async fn recommended_users(&self) -> SocialResult<Vec<UserProfile>> {
        self.record("recommended_users");
        if self.fail_recommendations.load(Ordering::SeqCst) {
            return Err(SocialError::api("get recommended users", "HTTP 503"));
        }
        let backend = self.backend.lock();
        Ok(backend
            .users
            .values()
            .filter(|user| user.id != self.me && !backend.are_friends(&self.me, &user.id))
            .cloned()
            .collect())
    }

    async fn outgoing_requests(&self) -> SocialResult<Vec<FriendRequest>> {
        self.record("outgoing_requests");
        let backend = self.backend.lock();
        Ok(backend
            .requests
            .iter()
            .filter(|request| request.sender.id == self.me)
            .cloned()
            .collect())
    }

    async fn friend_requests(&self) -> SocialResult<FriendRequests> {
        self.record("friend_requests");
        let backend = self.backend.lock();
        Ok(FriendRequests {
            incoming: backend
                .requests
                .iter()
                .filter(|request| request.recipient.id == self.me)
                .cloned()
                .collect(),
            outgoing: backend
                .requests
                .iter()
                .filter(|request| request.sender.id == self.me)
                .cloned()
                .collect(),
        })
    }

    async fn send_friend_request(&self, recipient: &UserId) -> SocialResult<FriendRequest> {
        self.record("send_friend_request");
        let mut backend = self.backend.lock();
        let recipient_profile = backend.profile(recipient)?;

        let pending = backend.requests.iter().any(|request| {
            (request.sender.id == self.me && &request.recipient.id == recipient)
                || (&request.sender.id == recipient && request.recipient.id == self.me)
        });
        if pending || backend.are_friends(&self.me, recipient) {
            return Err(SocialError::api(
                "send friend request",
                "Friend request already exists",
            ));
        }

        backend.next_request += 1;
        let request = FriendRequest {
            id: RequestId::new(format!("req-{}", backend.next_request)),
            sender: backend.profile(&self.me)?,
            recipient: recipient_profile,
            created_at: Some(Utc::now()),
        };
        backend.requests.push(request.clone());
        Ok(request)
    }

    async fn accept_friend_request(&self, request: &RequestId) -> SocialResult<FriendRequest> {
        self.record("accept_friend_request");
        let mut backend = self.backend.lock();
        let position = backend
            .requests
            .iter()
            .position(|r| &r.id == request && r.recipient.id == self.me)
            .ok_or_else(|| SocialError::not_found(format!("friend request {}", request)))?;

        let accepted = backend.requests.remove(position);
        backend
            .friendships
            .insert((accepted.sender.id.clone(), accepted.recipient.id.clone()));
        Ok(accepted)
    }
}

pub fn ann() -> UserProfile {
    UserProfile::new("u1", "Ann Lee")
        .with_course("Computer Science")
        .with_year("second year")
}

/// Ann with one friend (Bob), two strangers (Cara, Dev) and Eli
pub fn campus() -> FakeSocialApi {
    let api = FakeSocialApi::new(ann());
    api.add_user(UserProfile::new("u2", "Bob Kumar").with_course("Physics"))
        .add_user(UserProfile::new("u3", "Cara Diaz").with_course("Computer Engineering"))
        .add_user(UserProfile::new("u4", "Dev Patel").with_course("Mathematics"))
        .add_user(UserProfile::new("u5", "Eli Novak").with_course("Biology"))
        .befriend("u2");
    api
}
