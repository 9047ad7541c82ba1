//! Home feed and friends directory against one shared query cache

mod common;

use std::sync::Arc;

use clgvibe_call_core::UserId;
use clgvibe_social_core::{
    DirectoryTab, FriendsDirectory, HomeFeed, QueryCache, QueryKey, RequestRepository, SocialApi,
    SocialError, TabCounts,
};
use common::campus;

fn names<'a>(users: impl IntoIterator<Item = &'a clgvibe_social_core::UserProfile>) -> Vec<&'a str> {
    users.into_iter().map(|user| user.full_name.as_str()).collect()
}

#[tokio::test]
async fn test_home_send_refetches_only_keys_it_shows() {
    let api = Arc::new(campus());
    let mut feed = HomeFeed::new(api.clone(), Arc::new(QueryCache::new()));
    feed.load().await.unwrap();

    assert_eq!(names(feed.friends()), vec!["Bob Kumar"]);
    assert_eq!(feed.stats().suggestions, 3);
    assert!(!feed.has_requested(&UserId::new("u4")));

    let mutation = feed.send_request(&UserId::new("u4")).await.unwrap();

    assert_eq!(mutation.invalidates, RequestRepository::SEND_INVALIDATES.to_vec());
    assert!(feed.has_requested(&UserId::new("u4")));
    assert_eq!(api.calls("friends"), 1);
    assert_eq!(api.calls("recommended_users"), 2);
    assert_eq!(api.calls("outgoing_requests"), 2);
    assert_eq!(api.calls("friend_requests"), 0);
}

#[tokio::test]
async fn test_duplicate_send_fails_and_keeps_cache() {
    let api = Arc::new(campus());
    let cache = Arc::new(QueryCache::new());
    let mut feed = HomeFeed::new(api.clone(), cache.clone());
    feed.load().await.unwrap();
    feed.send_request(&UserId::new("u3")).await.unwrap();
    let outgoing_fetches = api.calls("outgoing_requests");

    let err = feed.send_request(&UserId::new("u3")).await.unwrap_err();

    assert!(matches!(err, SocialError::Api { .. }));
    assert!(cache.contains(QueryKey::OutgoingRequests));
    assert_eq!(api.calls("outgoing_requests"), outgoing_fetches);
    assert!(feed.has_requested(&UserId::new("u3")));
}

#[tokio::test]
async fn test_accept_moves_sender_into_friends() {
    let api = Arc::new(campus());
    let request = api.incoming_from("u5");
    let mut directory = FriendsDirectory::new(api.clone(), Arc::new(QueryCache::new()));
    directory.load().await.unwrap();

    assert_eq!(directory.incoming().len(), 1);
    assert_eq!(
        directory.tab_counts(),
        TabCounts { friends: 1, requests: 1, suggested: 3 }
    );

    directory.select_tab(DirectoryTab::Requests);
    let mutation = directory.accept(&request).await.unwrap();

    assert_eq!(mutation.value.sender.full_name, "Eli Novak");
    assert!(directory.incoming().is_empty());
    assert_eq!(names(directory.friends()), vec!["Bob Kumar", "Eli Novak"]);
    assert_eq!(directory.tab(), DirectoryTab::Requests);
    // Accept does not invalidate suggestions, so they are stale until the next load
    assert_eq!(api.calls("recommended_users"), 1);
    assert_eq!(api.calls("friends"), 2);
    assert_eq!(api.calls("friend_requests"), 2);
}

#[tokio::test]
async fn test_accepting_unknown_request_is_not_found() {
    let api = Arc::new(campus());
    let mut directory = FriendsDirectory::new(api.clone(), Arc::new(QueryCache::new()));
    directory.load().await.unwrap();

    let err = directory.accept(&"req-404".into()).await.unwrap_err();

    assert!(matches!(err, SocialError::NotFound { .. }));
    assert_eq!(api.calls("friends"), 1);
}

#[tokio::test]
async fn test_directory_send_shows_outgoing_request() {
    let api = Arc::new(campus());
    let mut directory = FriendsDirectory::new(api.clone(), Arc::new(QueryCache::new()));
    directory.load().await.unwrap();

    directory.send_request(&UserId::new("u3")).await.unwrap();

    let outgoing: Vec<&str> = directory
        .outgoing()
        .iter()
        .map(|request| request.recipient.id.as_str())
        .collect();
    assert_eq!(outgoing, vec!["u3"]);
    assert!(directory.incoming().is_empty());
}

#[tokio::test]
async fn test_pages_sharing_a_cache_see_each_others_writes() {
    let api = Arc::new(campus());
    let request = api.incoming_from("u3");
    let cache = Arc::new(QueryCache::new());
    let mut feed = HomeFeed::new(api.clone(), cache.clone());
    let mut directory = FriendsDirectory::new(api.clone(), cache.clone());
    let mut notices = cache.subscribe_invalidations();

    feed.load().await.unwrap();
    directory.load().await.unwrap();
    // Friends and suggestions were served from the cache the second time
    assert_eq!(api.calls("friends"), 1);
    assert_eq!(api.calls("recommended_users"), 1);

    let mutation = directory.accept(&request).await.unwrap();
    assert_eq!(notices.recv().await.unwrap(), mutation.invalidates);

    feed.refetch(&mutation.invalidates).await.unwrap();
    assert_eq!(names(feed.friends()), vec!["Bob Kumar", "Cara Diaz"]);
    assert_eq!(api.calls("friends"), 2);
}

#[tokio::test]
async fn test_search_matches_name_or_course() {
    let api = Arc::new(campus());
    let mut directory = FriendsDirectory::new(api, Arc::new(QueryCache::new()));
    directory.load().await.unwrap();

    directory.set_search("comp");
    assert_eq!(names(directory.recommended()), vec!["Cara Diaz"]);
    assert!(directory.friends_empty_state().is_some());

    directory.set_search("PATEL");
    assert_eq!(names(directory.recommended()), vec!["Dev Patel"]);

    directory.set_search("");
    assert_eq!(directory.recommended().len(), 3);
    assert!(directory.friends_empty_state().is_none());
}

#[tokio::test]
async fn test_failed_load_caches_nothing_for_failed_query() {
    let api = Arc::new(campus());
    api.fail_recommendations(true);
    let cache = Arc::new(QueryCache::new());
    let mut feed = HomeFeed::new(api.clone(), cache.clone());

    assert!(feed.load().await.is_err());
    assert!(!feed.is_loaded());
    assert!(!cache.contains(QueryKey::RecommendedUsers));

    api.fail_recommendations(false);
    feed.load().await.unwrap();
    assert!(feed.is_loaded());
    assert_eq!(api.calls("recommended_users"), 2);
}

#[tokio::test]
async fn test_fake_backend_excludes_self_and_friends_from_suggestions() {
    let api = campus();
    let suggested = api.recommended_users().await.unwrap();
    let ids: Vec<&str> = suggested.iter().map(|user| user.id.as_str()).collect();
    assert_eq!(ids, vec!["u3", "u4", "u5"]);
}

#[tokio::test]
async fn test_send_succeeds_when_reload_fails() {
    let api = Arc::new(campus());
    let mut feed = HomeFeed::new(api.clone(), Arc::new(QueryCache::new()));
    feed.load().await.unwrap();
    api.fail_recommendations(true);

    let mutation = feed.send_request(&UserId::new("u4")).await.unwrap();

    assert_eq!(mutation.value.recipient.id.as_str(), "u4");
    assert!(feed.has_requested(&UserId::new("u4")));
    // The stale list is kept rather than emptied
    assert_eq!(feed.stats().suggestions, 3);
    assert_eq!(api.calls("send_friend_request"), 1);
}

#[tokio::test]
async fn test_directory_send_succeeds_when_reload_fails() {
    let api = Arc::new(campus());
    let mut directory = FriendsDirectory::new(api.clone(), Arc::new(QueryCache::new()));
    directory.load().await.unwrap();
    api.fail_recommendations(true);

    directory.send_request(&UserId::new("u5")).await.unwrap();

    let outgoing: Vec<&str> = directory
        .outgoing()
        .iter()
        .map(|request| request.recipient.id.as_str())
        .collect();
    assert_eq!(outgoing, vec!["u5"]);
    assert_eq!(directory.recommended().len(), 3);
}

#[tokio::test]
async fn test_refetch_reports_failure_after_trying_every_key() {
    let api = Arc::new(campus());
    let cache = Arc::new(QueryCache::new());
    let mut feed = HomeFeed::new(api.clone(), cache.clone());
    feed.load().await.unwrap();
    api.fail_recommendations(true);
    api.befriend("u3");

    let keys = [QueryKey::RecommendedUsers, QueryKey::Friends];
    cache.invalidate(&keys);
    let err = feed.refetch(&keys).await.unwrap_err();

    assert!(matches!(err, SocialError::Api { .. }));
    assert_eq!(api.calls("recommended_users"), 2);
    assert_eq!(api.calls("friends"), 2);
    assert_eq!(names(feed.friends()), vec!["Bob Kumar", "Cara Diaz"]);
}
