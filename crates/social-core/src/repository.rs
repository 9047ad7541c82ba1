//! Read-through repositories over [`SocialApi`]
//!
//! Reads are cached in the shared [`QueryCache`]. Writes go straight to
//! the backend and return a [`Mutation`] listing the keys the write made
//! stale; applying that invalidation is the caller's decision.

use clgvibe_call_core::UserId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::SocialApi;
use crate::error::SocialResult;
use crate::query::{Mutation, QueryCache, QueryKey};
use crate::types::{FriendRequest, FriendRequests, RequestId, UserProfile};

#[derive(Clone)]
pub struct FriendRepository {
    api: Arc<dyn SocialApi>,
    cache: Arc<QueryCache>,
}

impl FriendRepository {
    pub fn new(api: Arc<dyn SocialApi>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn friends(&self) -> SocialResult<Vec<UserProfile>> {
        let friends = self
            .cache
            .get_or_fetch(QueryKey::Friends, || self.api.friends())
            .await?;
        Ok(friends.as_ref().clone())
    }
}

#[derive(Clone)]
pub struct RecommendationRepository {
    api: Arc<dyn SocialApi>,
    cache: Arc<QueryCache>,
}

impl RecommendationRepository {
    pub fn new(api: Arc<dyn SocialApi>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn recommended_users(&self) -> SocialResult<Vec<UserProfile>> {
        let users = self
            .cache
            .get_or_fetch(QueryKey::RecommendedUsers, || self.api.recommended_users())
            .await?;
        Ok(users.as_ref().clone())
    }
}

#[derive(Clone)]
pub struct RequestRepository {
    api: Arc<dyn SocialApi>,
    cache: Arc<QueryCache>,
}

impl RequestRepository {
    /// Keys made stale by sending a request
    pub const SEND_INVALIDATES: [QueryKey; 3] = [
        QueryKey::OutgoingRequests,
        QueryKey::FriendRequests,
        QueryKey::RecommendedUsers,
    ];

    /// Keys made stale by accepting a request
    pub const ACCEPT_INVALIDATES: [QueryKey; 2] = [QueryKey::FriendRequests, QueryKey::Friends];

    pub fn new(api: Arc<dyn SocialApi>, cache: Arc<QueryCache>) -> Self {
        Self { api, cache }
    }

    pub async fn outgoing_requests(&self) -> SocialResult<Vec<FriendRequest>> {
        let requests = self
            .cache
            .get_or_fetch(QueryKey::OutgoingRequests, || self.api.outgoing_requests())
            .await?;
        Ok(requests.as_ref().clone())
    }

    pub async fn friend_requests(&self) -> SocialResult<FriendRequests> {
        let requests = self
            .cache
            .get_or_fetch(QueryKey::FriendRequests, || self.api.friend_requests())
            .await?;
        Ok(requests.as_ref().clone())
    }

    pub async fn send_request(&self, recipient: &UserId) -> SocialResult<Mutation<FriendRequest>> {
        match self.api.send_friend_request(recipient).await {
            Ok(request) => {
                info!(recipient = %recipient, request_id = %request.id, "Friend request sent");
                Ok(Mutation::new(request, Self::SEND_INVALIDATES))
            }
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Sending friend request failed");
                Err(e)
            }
        }
    }

    pub async fn accept_request(&self, request: &RequestId) -> SocialResult<Mutation<FriendRequest>> {
        match self.api.accept_friend_request(request).await {
            Ok(accepted) => {
                info!(request_id = %request, sender = %accepted.sender.id, "Friend request accepted");
                Ok(Mutation::new(accepted, Self::ACCEPT_INVALIDATES))
            }
            Err(e) => {
                warn!(request_id = %request, error = %e, "Accepting friend request failed");
                Err(e)
            }
        }
    }
}
