//! Reasoning-service boundary for Apiary.
//!
//! The task decomposer asks an external text-generation oracle to break a
//! task into subtasks. That service may be down, slow, or return garbage, so
//! everything here is built around one rule: a reasoning failure is an
//! ordinary `Err`, never a panic, and callers always have a fallback.
//!
//! # Main types
//!
//! - [`ReasoningBackend`] — Trait for the external generation service.
//! - [`HttpReasoningBackend`] — reqwest-based implementation.
//! - [`ReasoningClient`] — Adds the mandatory timeout around any backend.

/// The reasoning backend trait.
pub mod backend;
/// Timeout-enforcing client wrapper.
pub mod client;
/// HTTP backend implementation.
pub mod http;

pub use backend::ReasoningBackend;
pub use client::ReasoningClient;
pub use http::{HttpReasoningBackend, ReasoningConfig};
