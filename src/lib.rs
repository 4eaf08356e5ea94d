//! Connection-resilience manager for a chat client backed by a peer-to-peer conductor.

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod polling;
pub mod resilience;
pub mod session;
pub mod transport;

pub use config::ResilienceConfig;
pub use connection::ConnectionStatus;
pub use error::{ResilienceError, ResilienceResult};
pub use lifecycle::Shutdown;
pub use session::{Action, ResilienceSession, ResilienceState, SessionEvent};
pub use transport::Transport;
