//! Events emitted by a mounted call controller

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::ExitTarget;
use crate::state::{CallingState, ConnectionState};
use crate::types::CallId;

/// Something observable happened in the call lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// The controller's connection state moved
    StateChanged {
        call_id: Option<CallId>,
        previous: ConnectionState,
        current: ConnectionState,
        at: DateTime<Utc>,
    },

    /// A notification arrived from the capability's state stream
    CallingStateReceived {
        call_id: CallId,
        state: CallingState,
    },

    /// Provisioning failed and the error view is showing
    ProvisionFailed {
        call_id: CallId,
        reason: String,
    },

    /// The session's connections were closed
    SessionReleased {
        call_id: CallId,
        /// The join finished after the view was already unmounted
        late_arrival: bool,
    },

    /// The controller navigated away
    Navigated {
        target: ExitTarget,
    },
}

/// Stream of controller events
pub type EventStream = BroadcastStream<CallEvent>;

/// Capacity of the controller's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub(crate) fn event_channel() -> broadcast::Sender<CallEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
