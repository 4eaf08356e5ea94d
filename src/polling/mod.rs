//! Polling subsystem.
//!
//! # Data Flow
//! ```text
//! setChannelPolling / setRefreshChatterInterval
//!     → manager.rs (create or replace task, new ticker epoch)
//!     → session actor spawns ticker
//!     → tick → manager decides: fetch | skip (in flight) | ignore (stale)
//!     → fetch result → manager records outcome
//!     → connectivity loss → connection state machine
//! ```
//!
//! # Design Decisions
//! - Backpressure by skipping ticks, never queueing them
//! - A failed fetch never stops its task
//! - Pause keeps intervals; resume restarts with them

pub mod manager;
pub mod task;

pub use manager::{FetchOutcome, PollEffect, PollingManager, TickDecision};
pub use task::{PollKind, PollingTask};
