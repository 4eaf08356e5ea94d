//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Session actor produces:
//!     → logging.rs (structured log events, session span)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape (optional)
//! ```
//!
//! # Design Decisions
//! - Every log line inside a session carries its session id
//! - Metrics are cheap and safe to call without a recorder

pub mod logging;
pub mod metrics;
