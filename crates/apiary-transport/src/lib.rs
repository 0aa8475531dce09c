//! Message transport seam for Apiary swarms.
//!
//! The orchestration core never talks to a wire protocol directly: every
//! delivery goes through the [`SwarmTransport`] trait. Delivery guarantees
//! belong to the transport implementation, not to this core.
//!
//! # Main types
//!
//! - [`SwarmTransport`] — Boundary trait for agent/coordinator messaging.
//! - [`InProcessTransport`] — mpsc-based implementation for tests and
//!   single-process embedders.

/// In-process mpsc transport implementation.
pub mod in_process;
/// The transport boundary trait.
pub mod transport;

pub use in_process::InProcessTransport;
pub use transport::{SwarmTransport, ORCHESTRATOR_SENDER};
