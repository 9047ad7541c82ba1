//! Profiles and friend requests as the REST backend returns them

use chrono::{DateTime, Utc};
use clgvibe_call_core::{Identity, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a friend request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A student profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Year of study, e.g. "second year"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub mutual_friends: u32,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            full_name: full_name.into(),
            profile_pic: None,
            bio: None,
            location: None,
            year: None,
            course: None,
            is_online: false,
            mutual_friends: 0,
        }
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Case-insensitive match of `query` against name and course.
    ///
    /// An empty query matches everyone.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.full_name.to_lowercase().contains(&needle)
            || self
                .course
                .as_deref()
                .is_some_and(|course| course.to_lowercase().contains(&needle))
    }

    /// The call identity for this profile
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            display_name: self.full_name.clone(),
            avatar_url: self.profile_pic.clone(),
        }
    }
}

/// A friend request with both ends populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(rename = "_id")]
    pub id: RequestId,
    pub sender: UserProfile,
    pub recipient: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Requests involving the current user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequests {
    #[serde(default)]
    pub incoming: Vec<FriendRequest>,
    #[serde(default)]
    pub outgoing: Vec<FriendRequest>,
}
