//! # ClgVibe Social Core
//!
//! Data access for the friends and home pages, and persisted UI
//! preferences.
//!
//! - [`SocialApi`] models the REST backend
//! - [`FriendRepository`], [`RequestRepository`] and
//!   [`RecommendationRepository`] read through a shared [`QueryCache`]
//! - writes return a [`Mutation`] naming the [`QueryKey`]s they made stale
//! - [`HomeFeed`] and [`FriendsDirectory`] are the page models built on top
//! - [`PreferenceStore`] / [`ThemePreference`] persist the UI theme
//!
//! ```rust,no_run
//! use clgvibe_social_core::{FriendsDirectory, QueryCache, SocialApi};
//! use std::sync::Arc;
//!
//! async fn accept_first(api: Arc<dyn SocialApi>) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut directory = FriendsDirectory::new(api, Arc::new(QueryCache::new()));
//!     directory.load().await?;
//!
//!     if let Some(request) = directory.incoming().first().map(|r| r.id.clone()) {
//!         let mutation = directory.accept(&request).await?;
//!         println!("refetched {:?}", mutation.invalidates);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod feed;
pub mod preferences;
pub mod query;
pub mod repository;
pub mod types;

pub use api::SocialApi;
pub use config::SocialConfig;
pub use directory::{DirectoryTab, EmptyState, FriendsDirectory, TabCounts, NO_FRIENDS};
pub use error::{SocialError, SocialResult};
pub use feed::{FeedStats, HomeFeed};
pub use preferences::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceChange, PreferenceStore, ThemePreference,
    ThemeSubscription, DEFAULT_THEME, THEME_KEY,
};
pub use query::{CacheStats, Mutation, QueryCache, QueryKey};
pub use repository::{FriendRepository, RecommendationRepository, RequestRepository};
pub use types::{FriendRequest, FriendRequests, RequestId, UserProfile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
