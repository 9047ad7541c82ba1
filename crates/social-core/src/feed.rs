//! Home page model: friends, suggestions and who has already been asked

use clgvibe_call_core::UserId;
use clgvibe_infra_common::LogContext;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn, Instrument, Level};

use crate::api::SocialApi;
use crate::error::SocialResult;
use crate::query::{Mutation, QueryCache, QueryKey};
use crate::repository::{FriendRepository, RecommendationRepository, RequestRepository};
use crate::types::{FriendRequest, UserProfile};

/// Counters shown in the page header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub friends: usize,
    pub suggestions: usize,
}

pub struct HomeFeed {
    friends_repo: FriendRepository,
    recommendations: RecommendationRepository,
    requests: RequestRepository,
    cache: Arc<QueryCache>,
    friends: Vec<UserProfile>,
    recommended: Vec<UserProfile>,
    requested: HashSet<UserId>,
    loaded: bool,
}

impl HomeFeed {
    /// Keys this page reads
    pub const KEYS: [QueryKey; 3] = [
        QueryKey::Friends,
        QueryKey::RecommendedUsers,
        QueryKey::OutgoingRequests,
    ];

    pub fn new(api: Arc<dyn SocialApi>, cache: Arc<QueryCache>) -> Self {
        Self {
            friends_repo: FriendRepository::new(api.clone(), cache.clone()),
            recommendations: RecommendationRepository::new(api.clone(), cache.clone()),
            requests: RequestRepository::new(api, cache.clone()),
            cache,
            friends: Vec::new(),
            recommended: Vec::new(),
            requested: HashSet::new(),
            loaded: false,
        }
    }

    /// Load all three queries concurrently
    pub async fn load(&mut self) -> SocialResult<()> {
        let span = LogContext::with_operation("home-feed", "load").span(Level::DEBUG);
        let (friends, recommended, outgoing) = async {
            futures::try_join!(
                self.friends_repo.friends(),
                self.recommendations.recommended_users(),
                self.requests.outgoing_requests(),
            )
        }
        .instrument(span)
        .await?;

        self.friends = friends;
        self.recommended = recommended;
        self.set_outgoing(&outgoing);
        self.loaded = true;
        debug!(
            friends = self.friends.len(),
            suggestions = self.recommended.len(),
            requested = self.requested.len(),
            "Home feed loaded"
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn friends(&self) -> &[UserProfile] {
        &self.friends
    }

    pub fn recommended(&self) -> &[UserProfile] {
        &self.recommended
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            friends: self.friends.len(),
            suggestions: self.recommended.len(),
        }
    }

    /// Whether a request to `user_id` is already pending
    pub fn has_requested(&self, user_id: &UserId) -> bool {
        self.requested.contains(user_id)
    }

    /// Send a request, invalidate what it made stale and reload the
    /// invalidated keys this page shows.
    ///
    /// Only the write decides the result. A reload that fails afterwards
    /// is logged and leaves that part of the page as it was.
    pub async fn send_request(&mut self, user_id: &UserId) -> SocialResult<Mutation<FriendRequest>> {
        let mutation = self.requests.send_request(user_id).await?;
        self.cache.invalidate(&mutation.invalidates);
        if let Err(e) = self.refetch(&mutation.invalidates).await {
            warn!(recipient = %user_id, error = %e, "Friend request sent but the page could not be refreshed");
        }
        Ok(mutation)
    }

    /// Reload the given keys if this page shows them.
    ///
    /// Every key is attempted; the first failure is returned.
    pub async fn refetch(&mut self, keys: &[QueryKey]) -> SocialResult<()> {
        let mut outcome = Ok(());
        for key in keys {
            let reloaded = match key {
                QueryKey::Friends => self.friends_repo.friends().await.map(|friends| self.friends = friends),
                QueryKey::RecommendedUsers => self
                    .recommendations
                    .recommended_users()
                    .await
                    .map(|users| self.recommended = users),
                QueryKey::OutgoingRequests => self
                    .requests
                    .outgoing_requests()
                    .await
                    .map(|outgoing| self.set_outgoing(&outgoing)),
                QueryKey::FriendRequests => Ok(()),
            };
            if let Err(e) = reloaded {
                debug!(key = %key, error = %e, "Reload failed");
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    fn set_outgoing(&mut self, outgoing: &[FriendRequest]) {
        self.requested = outgoing
            .iter()
            .map(|request| request.recipient.id.clone())
            .collect();
    }
}
