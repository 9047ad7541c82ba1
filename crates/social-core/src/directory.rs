//! Friends page model
//!
//! Three tabs over three queries: friends, incoming requests and
//! suggestions. A single search box filters friends and suggestions by
//! name or course.

use clgvibe_call_core::UserId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::SocialApi;
use crate::error::SocialResult;
use crate::query::{Mutation, QueryCache, QueryKey};
use crate::repository::{FriendRepository, RecommendationRepository, RequestRepository};
use crate::types::{FriendRequest, FriendRequests, RequestId, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryTab {
    #[default]
    Friends,
    Requests,
    Suggested,
}

/// Tab badge counts. Search does not affect them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCounts {
    pub friends: usize,
    pub requests: usize,
    pub suggested: usize,
}

/// Placeholder shown when there is nothing to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyState {
    pub title: &'static str,
    pub message: &'static str,
}

pub const NO_FRIENDS: EmptyState = EmptyState {
    title: "No friends yet",
    message: "Find your college mates and build your campus crew",
};

pub struct FriendsDirectory {
    friends_repo: FriendRepository,
    recommendations: RecommendationRepository,
    requests_repo: RequestRepository,
    cache: Arc<QueryCache>,
    friends: Vec<UserProfile>,
    requests: FriendRequests,
    recommended: Vec<UserProfile>,
    search: String,
    tab: DirectoryTab,
}

impl FriendsDirectory {
    /// Keys this page reads
    pub const KEYS: [QueryKey; 3] = [
        QueryKey::Friends,
        QueryKey::FriendRequests,
        QueryKey::RecommendedUsers,
    ];

    pub fn new(api: Arc<dyn SocialApi>, cache: Arc<QueryCache>) -> Self {
        Self {
            friends_repo: FriendRepository::new(api.clone(), cache.clone()),
            recommendations: RecommendationRepository::new(api.clone(), cache.clone()),
            requests_repo: RequestRepository::new(api, cache.clone()),
            cache,
            friends: Vec::new(),
            requests: FriendRequests::default(),
            recommended: Vec::new(),
            search: String::new(),
            tab: DirectoryTab::default(),
        }
    }

    pub async fn load(&mut self) -> SocialResult<()> {
        let (friends, requests, recommended) = futures::try_join!(
            self.friends_repo.friends(),
            self.requests_repo.friend_requests(),
            self.recommendations.recommended_users(),
        )?;
        self.friends = friends;
        self.requests = requests;
        self.recommended = recommended;
        debug!(counts = ?self.tab_counts(), "Friends directory loaded");
        Ok(())
    }

    pub fn tab(&self) -> DirectoryTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: DirectoryTab) {
        self.tab = tab;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn friends(&self) -> Vec<&UserProfile> {
        self.friends
            .iter()
            .filter(|friend| friend.matches_search(&self.search))
            .collect()
    }

    pub fn recommended(&self) -> Vec<&UserProfile> {
        self.recommended
            .iter()
            .filter(|user| user.matches_search(&self.search))
            .collect()
    }

    pub fn incoming(&self) -> &[FriendRequest] {
        &self.requests.incoming
    }

    pub fn outgoing(&self) -> &[FriendRequest] {
        &self.requests.outgoing
    }

    pub fn tab_counts(&self) -> TabCounts {
        TabCounts {
            friends: self.friends.len(),
            requests: self.requests.incoming.len(),
            suggested: self.recommended.len(),
        }
    }

    /// Placeholder for the friends tab when the (filtered) list is empty
    pub fn friends_empty_state(&self) -> Option<EmptyState> {
        self.friends().is_empty().then_some(NO_FRIENDS)
    }

    pub async fn accept(&mut self, request: &RequestId) -> SocialResult<Mutation<FriendRequest>> {
        let mutation = self.requests_repo.accept_request(request).await?;
        info!(request_id = %request, "Accepted friend request");
        self.apply(&mutation.invalidates).await;
        Ok(mutation)
    }

    pub async fn send_request(&mut self, user_id: &UserId) -> SocialResult<Mutation<FriendRequest>> {
        let mutation = self.requests_repo.send_request(user_id).await?;
        self.apply(&mutation.invalidates).await;
        Ok(mutation)
    }

    /// Invalidate `keys` and reload the ones this page shows. The write
    /// already succeeded, so a failed reload only leaves that list stale.
    async fn apply(&mut self, keys: &[QueryKey]) {
        self.cache.invalidate(keys);
        for key in keys {
            let reloaded = match key {
                QueryKey::Friends => self.friends_repo.friends().await.map(|friends| self.friends = friends),
                QueryKey::FriendRequests => self
                    .requests_repo
                    .friend_requests()
                    .await
                    .map(|requests| self.requests = requests),
                QueryKey::RecommendedUsers => self
                    .recommendations
                    .recommended_users()
                    .await
                    .map(|users| self.recommended = users),
                QueryKey::OutgoingRequests => Ok(()),
            };
            if let Err(e) = reloaded {
                warn!(key = %key, error = %e, "Could not reload friends page data");
            }
        }
    }
}
