//! Core types and error definitions for the Apiary swarm-orchestration core.
//!
//! This crate provides the foundational types shared across all Apiary
//! crates: the task and decomposition model, the agent model consumed from
//! the agent directory, inter-agent messages, and unified error handling.
//!
//! # Main types
//!
//! - [`ApiaryError`] — Unified error enum for all Apiary subsystems.
//! - [`ApiaryResult`] — Convenience alias for `Result<T, ApiaryError>`.
//! - [`ComplexTask`] — A user-requested unit of work to be decomposed.
//! - [`TaskDecomposition`] — The validated subtask graph of one task.
//! - [`SwarmAgent`] — A candidate worker fetched from the agent directory.
//! - [`AgentMessage`] — A point-to-point or broadcast message within a swarm.
//! - [`AgentDirectory`] — Boundary trait for querying candidate agents.

/// Agent model and the agent-directory boundary trait.
pub mod agent;
/// Unified error enum and result alias.
pub mod error;
/// Inter-agent message types.
pub mod message;
/// Task, subtask, dependency, and decomposition model.
pub mod task;

pub use agent::{
    AgentCapability, AgentDirectory, AgentSpecialization, CandidateCriteria, RolePreference,
    SortPreference, SpecializationLevel, SwarmAgent,
};
pub use error::{ApiaryError, ApiaryResult};
pub use message::{AgentMessage, MessagePriority, MessageType, Recipient};
pub use task::{
    ComplexTask, DependencyKind, RequirementImportance, RequirementType, SubTask, SubTaskStatus,
    TaskDecomposition, TaskDependency, TaskPriority, TaskRequirement,
};
