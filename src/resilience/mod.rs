//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! Link lost:
//!     → backoff.rs (delay for attempt n, capped)
//!     → connection state machine arms a timer with that delay
//!
//! Boundary call (handshake, fetch):
//!     → timeouts.rs (enforce deadline)
//!     → Timeout error classified by the caller
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Backoff is a pure function; tuning it never touches transition logic

pub mod backoff;
pub mod timeouts;

pub use backoff::BackoffPolicy;
