//! Connection states and the transition rules between them
//!
//! Two state vocabularies meet here:
//!
//! - [`CallingState`] is what the hosted call capability emits on its state
//!   stream. It is richer than we need and may repeat values.
//! - [`ConnectionState`] is the controller's own lifecycle. It only moves
//!   forward:
//!
//! ```text
//! idle ──► joining ──► joined ──► left
//!             │
//!             └──────► error
//! ```
//!
//! `left` and `error` are terminal; a fresh mount is the only way back to
//! `joining`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CallError, CallResult};

/// Lifecycle phase of one mounted call view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Nothing provisioned yet
    #[default]
    Idle,
    /// Provisioner running
    Joining,
    /// Live call
    Joined,
    /// Call ended (local leave, remote end or dropped stream)
    Left,
    /// Provisioning failed
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Joining => "joining",
            ConnectionState::Joined => "joined",
            ConnectionState::Left => "left",
            ConnectionState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Left | ConnectionState::Error)
    }

    /// Whether the loading view is shown for this state
    pub fn is_loading(&self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Joining)
    }

    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Idle, ConnectionState::Joining)
                | (ConnectionState::Joining, ConnectionState::Joined)
                | (ConnectionState::Joining, ConnectionState::Error)
                | (ConnectionState::Joined, ConnectionState::Left)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw calling state reported by the call capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingState {
    Unknown,
    Idle,
    Ringing,
    Joining,
    Joined,
    Reconnecting,
    ReconnectingFailed,
    Offline,
    Left,
}

impl CallingState {
    /// Only `left` ends a session; everything else is informational
    pub fn is_left(&self) -> bool {
        matches!(self, CallingState::Left)
    }

    /// States worth a warning while the call is live
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            CallingState::Reconnecting | CallingState::ReconnectingFailed | CallingState::Offline
        )
    }
}

/// One accepted transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub at: DateTime<Utc>,
}

/// Tracks a connection state and refuses transitions the lifecycle does not allow
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    current: ConnectionState,
    history: Vec<StateChange>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ConnectionState {
        self.current
    }

    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    /// Move to `next`, or fail with [`CallError::InvalidTransition`]
    pub fn transition(&mut self, next: ConnectionState) -> CallResult<StateChange> {
        if !self.current.can_transition_to(next) {
            return Err(CallError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }

        let change = StateChange {
            from: self.current,
            to: next,
            at: Utc::now(),
        };
        self.current = next;
        self.history.push(change.clone());
        Ok(change)
    }
}
