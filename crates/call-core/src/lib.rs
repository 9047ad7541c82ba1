//! # ClgVibe Call Core
//!
//! Call-session provisioning and lifecycle control for ClgVibe video calls.
//!
//! The hosted video infrastructure is treated as an opaque capability
//! ([`CallCapability`]). This crate owns the part around it:
//!
//! - [`SessionProvisioner`] turns an identity, a session token and a call id
//!   into a joined [`CallSession`], at most once per triple
//! - [`CallController`] drives one mounted call view through
//!   `idle → joining → joined → left` (or `error`), follows the call's state
//!   stream and releases every connection on every exit path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clgvibe_call_core::{CallConfig, CallController, CallDependencies, CallId, CallView};
//!
//! async fn show_call(deps: CallDependencies) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CallConfig::from_env()?;
//!     let controller = CallController::mount(deps, config, Some(CallId::new("room-42")))?;
//!
//!     let mut view = controller.watch_view();
//!     while view.changed().await.is_ok() {
//!         match &*view.borrow() {
//!             CallView::Loading => println!("connecting..."),
//!             CallView::Live(live) => println!("in call {} as {}", live.call_id, live.display_name),
//!             CallView::ConnectionError(err) => println!("{}: {}", err.title, err.message),
//!             CallView::Closed => break,
//!         }
//!     }
//!
//!     controller.unmount().await;
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod provisioner;
pub mod session;
pub mod state;
pub mod types;

pub use capability::{CallCapability, CallHandle, ClientHandle, ClientOptions, JoinOptions, StateSubscription};
pub use collaborators::{
    AuthProvider, AuthState, CachedTokenProvider, LogNotifier, Navigator, Notifier, TokenProvider,
    WatchAuthProvider,
};
pub use config::{CallConfig, ExitTarget};
pub use controller::{CallController, CallDependencies, CallView, ErrorView, LiveCallView};
pub use error::{CallError, CallResult, CapabilityError};
pub use events::{CallEvent, EventStream};
pub use provisioner::{ProvisionInputs, ProvisionOutcome, ProvisionStats, SessionProvisioner, SkipReason};
pub use session::CallSession;
pub use state::{CallingState, ConnectionState, StateChange, StateTracker};
pub use types::{call_cid, AccessToken, CallId, CallKind, Identity, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
