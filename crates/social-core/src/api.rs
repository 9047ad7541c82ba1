//! The REST backend behind the friends and home pages

use async_trait::async_trait;
use clgvibe_call_core::UserId;

use crate::error::SocialResult;
use crate::types::{FriendRequest, FriendRequests, RequestId, UserProfile};

/// Friend, request and recommendation endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Friends of the current user
    async fn friends(&self) -> SocialResult<Vec<UserProfile>>;

    /// Users the current user might want to add
    async fn recommended_users(&self) -> SocialResult<Vec<UserProfile>>;

    /// Requests the current user has sent and that are still pending
    async fn outgoing_requests(&self) -> SocialResult<Vec<FriendRequest>>;

    /// Incoming and outgoing requests together
    async fn friend_requests(&self) -> SocialResult<FriendRequests>;

    async fn send_friend_request(&self, recipient: &UserId) -> SocialResult<FriendRequest>;

    async fn accept_friend_request(&self, request: &RequestId) -> SocialResult<FriendRequest>;
}
