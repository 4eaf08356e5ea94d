//! Session subsystem: the resilience facade.
//!
//! # Data Flow
//! ```text
//! UI/store layer
//!     → handle.rs (validate payload, queue Action)
//!     → actor.rs (single event loop)
//!         → connection state machine (handshake, backoff, reconnect)
//!         → polling manager (channel-poll, chatter-poll)
//!     → snapshot.rs (watch channel, read without blocking)
//!     → events.rs (broadcast of ordered effects)
//! ```
//!
//! # Design Decisions
//! - One owner per session; no state is shared between tasks
//! - Transport is injected at spawn, never looked up
//! - Teardown leaves nothing running

pub mod action;
mod actor;
pub mod events;
pub mod handle;
pub mod snapshot;

pub use action::{Action, ParseActionError};
pub use events::SessionEvent;
pub use handle::ResilienceSession;
pub use snapshot::{PollingTaskView, ResilienceState};
