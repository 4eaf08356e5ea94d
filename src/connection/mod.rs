//! Connection subsystem.
//!
//! # Data Flow
//! ```text
//! signal_disconnect / failed fetch / failed first handshake
//!     → machine.rs (Disconnected → Reconnecting, attempt 0 armed)
//!     → session actor arms timer tagged with the epoch
//!     → timer fires → handshake via transport
//!     → success: Connected, polling resumes
//!     → failure: attempt n+1 armed with the next backoff delay
//! ```
//!
//! # Design Decisions
//! - The machine is sans-IO; the session actor executes its effects
//! - The `Reconnecting` status is the mutual-exclusion guard for handshakes
//! - Cancellation is an epoch bump; late callbacks discard themselves

pub mod machine;
pub mod state;

pub use machine::{ConnectionEffect, ConnectionStateMachine};
pub use state::{ConnectionStatus, ReconnectAttempt};
