//! Swarm session state and durable persistence for Apiary.
//!
//! A [`SwarmSession`] is the aggregate root created per orchestration
//! request: it owns the task, the selected agents, the append-only message
//! log, accumulated results, and the final performance metrics. The
//! [`SessionStore`] trait is the seam to durable storage; [`FileSessionStore`]
//! is the bundled JSON-file implementation.
//!
//! # Main types
//!
//! - [`SwarmSession`] — Aggregate root for one swarm's mutable state.
//! - [`SessionStatus`] — Lifecycle state machine (forming → … → dissolved).
//! - [`SwarmPerformanceMetrics`] — Final metrics computed at dissolution.
//! - [`SessionStore`] — Boundary trait for durable persistence.
//! - [`FileSessionStore`] — JSON-files-on-disk store.

/// Session aggregate, lifecycle, results, and performance metrics.
pub mod session;
/// Durable session store trait and file-based implementation.
pub mod store;

pub use session::{SessionStatus, SwarmPerformanceMetrics, SwarmResult, SwarmSession};
pub use store::{FileSessionStore, SessionStore};
